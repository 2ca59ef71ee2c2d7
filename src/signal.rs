use crate::sim_if::SIM_IF;
use crate::trigger::Trigger;
use crate::value::Val;
use crate::{RstbResult, SimpleResult};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SimObject {
    pub(crate) handle: usize,
    pub(crate) kind: ObjectKind,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ObjectKind {
    Int(u32),
    Hier,
}

impl SimObject {
    pub fn handle(&self) -> usize {
        self.handle
    }

    pub fn kind(&self) -> ObjectKind {
        self.kind
    }

    pub fn name(&self) -> String {
        SIM_IF
            .get_full_name(self)
            .unwrap_or_else(|_| format!("<handle {}>", self.handle))
    }

    pub fn size(&self) -> u32 {
        match self.kind {
            ObjectKind::Int(size) => size,
            ObjectKind::Hier => 0,
        }
    }

    pub fn has_value(&self) -> bool {
        matches!(self.kind, ObjectKind::Int(_))
    }

    pub fn get_child(&self, name: &str) -> SimpleResult<Self> {
        let mut child_name = self.name();
        child_name.push('.');
        child_name.push_str(name);
        SimObject::from_name(&child_name)
    }

    pub fn from_name(full_name: &str) -> SimpleResult<Self> {
        SIM_IF.get_object_by_name(full_name)
    }

    pub fn get_root() -> SimpleResult<Self> {
        SIM_IF.get_root_object()
    }

    pub fn c(&self, name: &str) -> Self {
        self.get_child(name)
            .unwrap_or_else(|_| panic!("Could not get object with name {}.{}", self.name(), name))
    }

    pub fn try_u32(&self) -> SimpleResult<u32> {
        SIM_IF.get_value(self)
    }

    pub fn u32(&self) -> u32 {
        self.try_u32()
            .unwrap_or_else(|e| panic!("Can't read {}: {}", self.name(), e))
    }

    pub fn bool(&self) -> bool {
        self.u32() != 0
    }

    pub fn try_set(&self, val: u32) -> SimpleResult<()> {
        SIM_IF.set_value(self, val)
    }

    pub fn set(&self, val: u32) {
        self.try_set(val)
            .unwrap_or_else(|e| panic!("Can't set {} to {}: {}", self.name(), val, e))
    }

    // convenience functions to get edge triggers for this signal
    pub fn rising_edge(self) -> Trigger {
        Trigger::rising_edge(self)
    }
    pub async fn rising_edge_ro(self) -> RstbResult {
        self.rising_edge().await;
        Trigger::read_only().await;
        Ok(Val::None)
    }
    pub async fn rising_edge_rw(self) -> RstbResult {
        self.rising_edge().await;
        Trigger::read_write().await;
        Ok(Val::None)
    }
    pub fn falling_edge(self) -> Trigger {
        Trigger::falling_edge(self)
    }
    pub fn edge(self) -> Trigger {
        Trigger::edge(self)
    }
}
