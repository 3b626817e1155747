use esp_config::{generate_config, ConfigOption, DisplayHint, Stability, Validator, Value};

fn main() {
    // emit config
    generate_config(
        "esp-hw-support",
        &[
            ConfigOption {
                name: "max-reserved-regions".to_string(),
                description: "Capacity of the working set used to resolve reserved memory \
                regions. Must hold every linker-registered reservation plus the static data \
                and IRAM code ranges."
                    .to_string(),
                default_value: Value::Integer(16),
                constraint: Some(Validator::PositiveInteger),
                stability: Stability::Unstable,
                active: true,
                display_hint: DisplayHint::None,
            },
            ConfigOption {
                name: "min-region-size".to_string(),
                description: "Available memory regions whose size in bytes is not larger \
                than this value are dropped instead of being handed to the heap. With the \
                default of 0 only empty regions are dropped."
                    .to_string(),
                default_value: Value::Integer(0),
                constraint: Some(Validator::NonNegativeInteger),
                stability: Stability::Unstable,
                active: true,
                display_hint: DisplayHint::None,
            },
        ],
        true,
        true,
    );
}
