//! Operation capability table.
//!
//! # Responsibilities
//! - Map an operation name to how it must be routed
//! - Let the integration layer describe its own operations
//!
//! # Design Decisions
//! - Names not in the table are not routed; they run on any working connection
//! - No query parsing: capability comes from the name alone

use std::collections::HashMap;

/// How a registered operation is executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    /// Runs on one connection chosen by the decision algorithm.
    Routed,
    /// Runs on every connection, replicas first.
    Broadcast,
}

/// Routing capabilities of one operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperationSpec {
    pub requires_primary: bool,
    pub kind: OperationKind,
}

impl OperationSpec {
    pub const fn read() -> Self {
        Self {
            requires_primary: false,
            kind: OperationKind::Routed,
        }
    }

    pub const fn write() -> Self {
        Self {
            requires_primary: true,
            kind: OperationKind::Routed,
        }
    }

    pub const fn broadcast() -> Self {
        Self {
            requires_primary: false,
            kind: OperationKind::Broadcast,
        }
    }
}

const READS: &[&str] = &["select", "select_all", "select_one", "select_value", "query", "exists"];

const WRITES: &[&str] = &[
    "insert",
    "update",
    "delete",
    "execute",
    "begin_transaction",
    "commit",
    "rollback",
    "create_savepoint",
    "release_savepoint",
];

const BROADCASTS: &[&str] = &[
    "connect",
    "disconnect",
    "reconnect",
    "verify",
    "reset",
    "set_session",
];

/// Operation name → capabilities.
#[derive(Debug, Clone, Default)]
pub struct OperationTable {
    entries: HashMap<String, OperationSpec>,
}

impl OperationTable {
    /// An empty table: nothing is routed.
    pub fn new() -> Self {
        Self::default()
    }

    /// Common SQL-adapter operation names.
    pub fn standard() -> Self {
        let mut table = Self::new();
        for name in READS {
            table.register(*name, OperationSpec::read());
        }
        for name in WRITES {
            table.register(*name, OperationSpec::write());
        }
        for name in BROADCASTS {
            table.register(*name, OperationSpec::broadcast());
        }
        table
    }

    pub fn register(&mut self, name: impl Into<String>, spec: OperationSpec) -> &mut Self {
        self.entries.insert(name.into(), spec);
        self
    }

    pub fn get(&self, name: &str) -> Option<OperationSpec> {
        self.entries.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
