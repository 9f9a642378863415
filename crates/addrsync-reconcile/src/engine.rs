use crate::{AddressRecord, ExclusionSet, Field, FieldWrite, OrderAddresses, Role, SyncDirection};

/// Fill-only comparison of one field from `source` into `target`.
fn fill_one(
    target_role: Role,
    field: Field,
    source: &AddressRecord,
    target: &AddressRecord,
    excluded: &ExclusionSet,
    writes: &mut Vec<FieldWrite>,
) {
    if excluded.contains(target_role, field) {
        return;
    }

    let source_value = source.get(field);
    if target.is_empty_field(field) && !source_value.is_empty() {
        writes.push(FieldWrite::new(target_role, field, source_value));
    }
}

/// Deterministic reconciliation:
/// - billing -> shipping pass over `fields` (when direction allows)
/// - shipping -> billing pass over `fields` (when direction allows)
///
/// Both passes read the same input snapshots. Each pass only writes its own
/// target role, so a (role, field) pair appears at most once in the output.
/// Output order: all shipping writes in field order, then all billing writes.
pub fn compute(
    billing: &AddressRecord,
    shipping: &AddressRecord,
    direction: SyncDirection,
    fields: &[Field],
    excluded: &ExclusionSet,
) -> Vec<FieldWrite> {
    let mut writes: Vec<FieldWrite> = Vec::new();

    if direction.writes_to(Role::Shipping) {
        for &field in fields {
            fill_one(Role::Shipping, field, billing, shipping, excluded, &mut writes);
        }
    }

    if direction.writes_to(Role::Billing) {
        for &field in fields {
            fill_one(Role::Billing, field, shipping, billing, excluded, &mut writes);
        }
    }

    // A field list with duplicates must not yield the same write twice.
    let mut seen = std::collections::BTreeSet::new();
    writes.retain(|w| seen.insert((w.role, w.field)));

    writes
}

/// `true` if [`compute`] would produce at least one write.
pub fn needs_sync(
    addresses: &OrderAddresses,
    direction: SyncDirection,
    fields: &[Field],
    excluded: &ExclusionSet,
) -> bool {
    !compute(
        &addresses.billing,
        &addresses.shipping,
        direction,
        fields,
        excluded,
    )
    .is_empty()
}

/// Apply computed writes to an in-memory snapshot.
pub fn apply(addresses: &mut OrderAddresses, writes: &[FieldWrite]) {
    for w in writes {
        addresses.record_mut(w.role).set(w.field, w.value.clone());
    }
}
