use calmform::{FieldKey, FieldValue, FormModel};

#[derive(Clone, calmform::FormModel)]
struct DemoForm {
    email: String,
    newsletter: bool,
}

fn main() {
    let mut model = DemoForm {
        email: "a@calm.ui".to_string(),
        newsletter: false,
    };
    let key = FieldKey::new("email");
    assert!(model.set_field(&key, FieldValue::from("b@calm.ui")));
    assert_eq!(model.field(&key), Some(FieldValue::from("b@calm.ui")));
    assert_eq!(model.field_keys().len(), 2);
    assert!(!model.set_field(&FieldKey::new("missing"), FieldValue::Null));
}
