/// Query parameter value accepted by every endpoint method.
///
/// Booleans are encoded as the JSON literals `true`/`false` on the wire;
/// everything else passes through as its plain string form.
#[derive(Debug, Clone, PartialEq)]
pub enum Param {
    Text(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl Param {
    pub fn encode(&self) -> String {
        match self {
            Param::Text(value) => value.clone(),
            Param::Int(value) => value.to_string(),
            Param::Float(value) => value.to_string(),
            Param::Bool(value) => String::from(if *value { "true" } else { "false" }),
        }
    }
}

impl From<&str> for Param {
    fn from(value: &str) -> Self {
        Param::Text(value.to_string())
    }
}

impl From<String> for Param {
    fn from(value: String) -> Self {
        Param::Text(value)
    }
}

impl From<i64> for Param {
    fn from(value: i64) -> Self {
        Param::Int(value)
    }
}

impl From<f64> for Param {
    fn from(value: f64) -> Self {
        Param::Float(value)
    }
}

impl From<bool> for Param {
    fn from(value: bool) -> Self {
        Param::Bool(value)
    }
}

pub fn encode_params(params: &[(&str, Param)]) -> Vec<(String, String)> {
    params
        .iter()
        .map(|(key, value)| ((*key).to_string(), value.encode()))
        .collect()
}
