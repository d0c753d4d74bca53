use crate::store::{DocPath, Fields};

/// A single accumulated write operation.
#[derive(Debug, Clone)]
pub enum WriteOp {
    Set { path: DocPath, fields: Fields },
    Update { path: DocPath, fields: Fields },
    Delete { path: DocPath },
}

impl WriteOp {
    pub fn path(&self) -> &DocPath {
        match self {
            WriteOp::Set { path, .. } => path,
            WriteOp::Update { path, .. } => path,
            WriteOp::Delete { path } => path,
        }
    }
}

/// Accumulates write operations for a single atomic commit.
///
/// Each invocation site builds its own batch; batches are never shared.
#[derive(Debug, Clone, Default)]
pub struct WriteBatch {
    ops: Vec<WriteOp>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, path: DocPath, fields: Fields) {
        self.ops.push(WriteOp::Set { path, fields });
    }

    pub fn update(&mut self, path: DocPath, fields: Fields) {
        self.ops.push(WriteOp::Update { path, fields });
    }

    pub fn delete(&mut self, path: DocPath) {
        self.ops.push(WriteOp::Delete { path });
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn ops(&self) -> &[WriteOp] {
        &self.ops
    }

    pub fn into_ops(self) -> Vec<WriteOp> {
        self.ops
    }
}
