use std::collections::HashSet;

use crate::migrations::Migration;

/// Migrations still to apply, in caller order.
#[derive(Debug)]
pub struct Plan<'a> {
    pub pending: Vec<&'a Migration>,
    pub skipped: usize,
}

/// Split `requested` into pending and already-applied migrations.
///
/// Order is kept as given because later migrations may depend on the schema
/// changes of earlier ones.
pub fn plan<'a>(requested: &'a [Migration], applied: &HashSet<String>) -> Plan<'a> {
    let mut pending = Vec::new();
    let mut skipped = 0;
    for migration in requested {
        if applied.contains(&migration.name) {
            skipped += 1;
        } else {
            pending.push(migration);
        }
    }
    Plan { pending, skipped }
}
