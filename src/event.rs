use std::future::Future;

use crate::controller::{FormController, FormResult, SubmitError, SubmitOutcome};
use crate::validation::ValidationError;
use crate::value::{FieldKey, FieldValue, FormModel};

#[derive(Clone, Debug, PartialEq)]
pub struct ChangeEvent {
    name: FieldKey,
    value: FieldValue,
}

impl ChangeEvent {
    pub fn new(name: impl Into<FieldKey>, value: impl Into<FieldValue>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    pub fn name(&self) -> &FieldKey {
        &self.name
    }

    pub fn value(&self) -> &FieldValue {
        &self.value
    }
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct SubmitEvent {
    default_prevented: bool,
}

impl SubmitEvent {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn prevent_default(&mut self) {
        self.default_prevented = true;
    }

    pub fn default_prevented(&self) -> bool {
        self.default_prevented
    }
}

impl<M, E> FormController<M, E>
where
    M: FormModel,
    E: ValidationError,
{
    pub fn handle_input_change(&self, event: &ChangeEvent) -> FormResult<()> {
        self.set(event.name.clone(), event.value.clone())
    }

    pub fn handle_submit(
        &self,
        event: &mut SubmitEvent,
        f: impl FnOnce(&M) -> Result<(), SubmitError> + 'static,
    ) -> FormResult<SubmitOutcome> {
        event.prevent_default();
        self.submit(f)
    }

    pub async fn handle_submit_async<F, Fut>(
        &self,
        event: &mut SubmitEvent,
        f: F,
    ) -> FormResult<SubmitOutcome>
    where
        F: FnOnce(&M) -> Fut + 'static,
        Fut: Future<Output = Result<(), SubmitError>> + Send + 'static,
    {
        event.prevent_default();
        self.submit_async(f).await
    }
}
