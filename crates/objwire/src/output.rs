use std::io::IsTerminal;

use clap::ValueEnum;
use objwire_codec::{encode, Array, Value};

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Pretty
        } else {
            Self::Json
        }
    }
}

/// Print the result values of one call.
pub fn print_values(values: &[Value], format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let rendered: Vec<serde_json::Value> = values.iter().map(value_to_json).collect();
            println!(
                "{}",
                serde_json::to_string(&rendered).unwrap_or_else(|_| "[]".to_string())
            );
        }
        OutputFormat::Pretty => {
            for (index, value) in values.iter().enumerate() {
                println!("[{index}] {}", encode(value));
            }
        }
        OutputFormat::Raw => {
            for value in values {
                println!("{}", encode(value));
            }
        }
    }
}

/// Map a wire value onto JSON. Lossy where JSON is weaker: non-finite floats
/// become null, non-string dict keys are rendered to their wire text.
pub fn value_to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::Int { value, .. } => serde_json::Value::from(*value),
        Value::Float { value, .. } => serde_json::Number::from_f64(*value)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        Value::Str(s) => serde_json::Value::String(s.clone()),
        Value::Array(array) => array_to_json(array),
        Value::Dict(pairs) => serde_json::Value::Object(
            pairs
                .iter()
                .map(|(key, value)| {
                    let key = match key {
                        Value::Str(s) => s.clone(),
                        other => encode(other),
                    };
                    (key, value_to_json(value))
                })
                .collect(),
        ),
        Value::Tuple(items) => serde_json::Value::Array(items.iter().map(value_to_json).collect()),
        Value::Object(object) => {
            let mut map = serde_json::Map::new();
            map.insert(
                "_class".to_string(),
                serde_json::Value::String(object.classname.clone()),
            );
            for (key, value) in object.options.iter() {
                map.insert(key.clone(), value_to_json(value));
            }
            serde_json::Value::Object(map)
        }
    }
}

fn array_to_json(array: &Array) -> serde_json::Value {
    let row = |start: usize, len: usize| -> serde_json::Value {
        serde_json::Value::Array(
            (start..start + len)
                .filter_map(|i| array.data.get(i))
                .map(|v| value_to_json(&v))
                .collect(),
        )
    };
    match array.shape.as_slice() {
        [rows, cols] => serde_json::Value::Array(
            (0..*rows).map(|r| row(r * cols, *cols)).collect(),
        ),
        _ => row(0, array.data.len()),
    }
}
