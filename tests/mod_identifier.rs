mod common;

use bson::oid::ObjectId;
use bson::{Bson, doc};

use common::{Setting, User, memory_odm};
use odmkit::errors::OdmError;
use odmkit::identifier::{IdInput, identifier_for, parse_identifier, resolve_identifier_field};
use odmkit::logger::sink;

#[test]
fn models_declare_identifier_kind() {
    assert!(resolve_identifier_field::<User>());
    assert!(!resolve_identifier_field::<Setting>());
}

#[test]
fn hex_text_and_native_ids_parse_to_the_same_value() {
    let id = ObjectId::new();
    assert_eq!(parse_identifier(id.to_hex().as_str()).unwrap(), id);
    assert_eq!(parse_identifier(&id).unwrap(), id);
    assert_eq!(IdInput::from(Bson::String(id.to_hex())), IdInput::Text(id.to_hex()));
}

#[test]
fn malformed_and_unsupported_inputs() {
    assert!(matches!(parse_identifier("zzzz"), Err(OdmError::InvalidIdentifier(_))));
    assert!(matches!(parse_identifier(Bson::Boolean(true)), Err(OdmError::UnsupportedIdentifierType(_))));
    assert!(matches!(
        identifier_for::<Setting>(ObjectId::new()),
        Err(OdmError::MissingIdentifierField(name)) if name.ends_with("Setting")
    ));
}

#[test]
fn where_id_adds_an_equality_clause() {
    let (odm, _) = memory_odm();
    let id = ObjectId::new();
    let q = odm.query::<User>("users").where_("age", ">", 1).where_id(id.to_hex()).unwrap();
    assert_eq!(q.to_bson(), doc! { "age": { "$gt": 1 }, "_id": id });
}

#[test]
fn where_id_degrades_to_none_with_a_warning() {
    let _g = sink::enable_thread_sink();
    let (odm, _) = memory_odm();
    assert!(odm.query::<User>("users").where_id("not-hex").is_none());
    assert!(odm.query::<Setting>("settings").where_id(ObjectId::new()).is_none());
    let messages = sink::drain();
    assert_eq!(messages.len(), 2);
    assert!(messages.iter().all(|m| m.starts_with("where_id on")));
}

#[test]
fn try_where_id_finds_the_stored_document() {
    let (odm, _) = memory_odm();
    let q = odm.query::<User>("users");
    let id = q.create(&User::new("alice", 30)).unwrap();
    let oid = id.as_object_id().unwrap();
    let found = q.clone().try_where_id(oid.to_hex()).unwrap().first().unwrap();
    assert_eq!(found.id, Some(oid));
    assert_eq!(found.name, "alice");
    assert!(q.try_where_id(ObjectId::new()).unwrap().first().unwrap_err().is_not_found());
}
