use crate::models::{EnumInput, SelectOption};

/// Uppercases the first character of every whitespace-separated word.
///
/// Runs of whitespace collapse to a single space, and leading/trailing
/// whitespace is dropped.
pub fn capitalize_words(words: &str) -> String {
    words
        .split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

/// Display text for an enumerated field.
///
/// A pair is rendered from its `label`, not its `value`. A missing input
/// yields an empty string.
pub fn normalize_enum_field(input: Option<&EnumInput>) -> String {
    match input {
        Some(EnumInput::Plain(value)) => capitalize_words(value),
        Some(EnumInput::Option(option)) => capitalize_words(&option.label),
        None => String::new(),
    }
}

/// Rebuilds the select-control pair for a stored enum value.
pub fn select_option_for(value: &str) -> SelectOption {
    SelectOption {
        value: value.to_string(),
        label: normalize_enum_field(Some(&EnumInput::Plain(value.to_string()))),
    }
}
