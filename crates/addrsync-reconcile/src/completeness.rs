use crate::{AddressRecord, Field};

/// Fields an address needs before it is considered deliverable.
/// Company, second line and phone are optional.
pub const REQUIRED_FIELDS: [Field; 7] = [
    Field::FirstName,
    Field::LastName,
    Field::Address1,
    Field::City,
    Field::State,
    Field::Postcode,
    Field::Country,
];

/// `true` when every required field is non-empty.
pub fn is_address_complete(record: &AddressRecord) -> bool {
    REQUIRED_FIELDS.iter().all(|f| !record.is_empty_field(*f))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn optional_fields_do_not_affect_completeness() {
        let rec = REQUIRED_FIELDS
            .iter()
            .fold(AddressRecord::empty(), |r, f| r.with(*f, "x"));
        assert!(is_address_complete(&rec));

        let missing_state = rec.clone().with(Field::State, "");
        assert!(!is_address_complete(&missing_state));
    }
}
