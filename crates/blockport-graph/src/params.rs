use std::collections::BTreeMap;

use blockport_core::{KernelError, KernelResult};

#[derive(Clone, Debug, PartialEq)]
pub enum ParamValue {
    I32(i32),
    F32(f32),
    Str(String),
}

/// Named setup-time parameters an operation hands to a kernel's setup.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct KernelParams {
    values: BTreeMap<String, ParamValue>,
}

impl KernelParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_i32(mut self, name: &str, value: i32) -> Self {
        self.values.insert(name.to_string(), ParamValue::I32(value));
        self
    }

    pub fn with_f32(mut self, name: &str, value: f32) -> Self {
        self.values.insert(name.to_string(), ParamValue::F32(value));
        self
    }

    pub fn with_str(mut self, name: &str, value: impl Into<String>) -> Self {
        self.values
            .insert(name.to_string(), ParamValue::Str(value.into()));
        self
    }

    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.values.get(name)
    }

    pub fn get_i32(&self, name: &str) -> KernelResult<i32> {
        match self.values.get(name) {
            Some(ParamValue::I32(v)) => Ok(*v),
            Some(other) => Err(KernelError::Schema(format!(
                "parameter `{name}` should be i32, found {other:?}"
            ))),
            None => Err(KernelError::Schema(format!("missing parameter `{name}`"))),
        }
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        match self.values.get(name) {
            Some(ParamValue::Str(s)) => Some(s),
            _ => None,
        }
    }
}
