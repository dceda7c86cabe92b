mod controller;
mod event;
mod validation;
mod value;


pub use calmform_derive::FormModel;
pub use controller::{
    FieldMeta, FormController, FormError, FormOptions, FormResult, FormSnapshot, RevalidateMode,
    SubmitError, SubmitOutcome, SubmitState, ValidationMode, ValidationTicket,
};
pub use event::{ChangeEvent, SubmitEvent};
pub use validation::{
    AsyncFieldValidator, BoxedValidationFuture, FieldValidator, FormValidator, SchemaBuilder,
    ValidationError, ValidationSchema,
};
pub use value::{FieldKey, FieldScalar, FieldValue, FormModel, FormValues};
