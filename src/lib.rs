//! # Hardware Support Routines for Espressif Devices
//!
//! ## Overview
//!
//! This crate contains chip support code which is pure computation over
//! factory data and link-time constants, and therefore runs the same on the
//! device and on the host:
//!
//! - [adc]: turning raw ADC readings into calibrated millivolts using the
//!   factory calibration burnt into eFuse, including the polynomial error
//!   correction used by the ESP32-S3 and ESP32-C3
//! - [efuse]: bit-level access to eFuse blocks and the per-chip decoders for
//!   the ADC calibration data
//! - [memory_layout]: computing the memory regions which are available to the
//!   heap once code, static data and explicit reservations are removed
//!
//! ## Example
//!
//! ```rust
//! use esp_hw_support::{
//!     adc::{AdcUnit, Attenuation, Chip, characterize},
//!     efuse::{EfuseImage, esp32s3},
//! };
//!
//! // A fuse image as read from an ESP32-S3 with ADC calibration V1.
//! let image = EfuseImage::new()
//!     .with_field(esp32s3::BLK_VERSION_MAJOR, 1)
//!     .with_field(esp32s3::ADC1_CAL_VOL_ATTEN3, 100);
//! let efuse = esp32s3::AdcCalibration::new(image);
//!
//! let chars = characterize(Chip::Esp32s3, &efuse, AdcUnit::Adc1, Attenuation::_11dB, 12, 1100)
//!     .unwrap();
//! let millivolts = chars.raw_to_voltage(2048);
//! assert!(millivolts > 1500);
//! ```
//!
//! ## Additional configuration
//!
//! We've exposed some configuration options that don't fit into cargo
//! features. These can be set via environment variables, or via cargo's `[env]`
//! section inside `.cargo/config.toml`. Below is a table of tunable parameters
//! for this crate:
#![doc = ""]
#![doc = include_str!(concat!(env!("OUT_DIR"), "/esp_hw_support_config_table.md"))]
#![doc = ""]
//! ## Feature Flags
#![doc = document_features::document_features!(feature_label = r#"<span class="stab portability"><code>{feature}</code></span>"#)]
#![doc(html_logo_url = "https://avatars.githubusercontent.com/u/46717278")]
#![no_std]

// MUST be the first module
mod fmt;

pub mod adc;
pub mod efuse;
pub mod memory_layout;
