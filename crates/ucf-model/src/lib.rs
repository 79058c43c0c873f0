pub mod address;
pub mod error;
pub mod section;
pub mod snapshot;
pub mod value;

pub use address::Address;
pub use error::ModelError;
pub use section::{SectionRecord, TEMP_ID_PREFIX, is_temp_id};
pub use snapshot::Snapshot;
pub use value::Value;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn temp_ids_never_collide_with_backend_ids() {
        assert!(is_temp_id(".new.0"));
        assert!(is_temp_id(".new.42"));
        assert!(!is_temp_id("cfg0123af"));
        assert!(!is_temp_id("lan"));
        assert!(!is_temp_id(""));
    }

    #[test]
    fn section_wire_round_trip() {
        let mut record = SectionRecord::new("lan", "interface");
        record.index = 2;
        record.options.insert("proto".into(), Value::from("static"));
        record
            .options
            .insert("dns".into(), Value::from(vec!["8.8.8.8", "1.1.1.1"]));

        let wire = record.to_wire();
        let round = SectionRecord::from_wire("lan", &wire).expect("decode wire record");
        assert_eq!(round, record);
    }
}
