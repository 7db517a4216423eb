use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::symbols::LocalId;

use super::values::Value;

#[derive(Clone)]
pub struct Env {
    parent: Option<Arc<Env>>,
    values: Arc<Mutex<HashMap<LocalId, Value>>>,
}

impl Env {
    pub fn new(parent: Option<Arc<Env>>) -> Self {
        Self {
            parent,
            values: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn child(&self) -> Self {
        Self::new(Some(Arc::new(self.clone())))
    }

    pub fn get(&self, id: LocalId) -> Option<Value> {
        if let Ok(values) = self.values.lock() {
            if let Some(value) = values.get(&id) {
                return Some(value.clone());
            }
        }
        self.parent.as_ref().and_then(|parent| parent.get(id))
    }

    pub fn set(&self, id: LocalId, value: Value) {
        if let Ok(mut values) = self.values.lock() {
            values.insert(id, value);
        }
    }
}
