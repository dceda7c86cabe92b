use std::collections::{BTreeMap, BTreeSet};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use futures_timer::Delay;

use crate::controller::{
    FormController, FormResult, RevalidateMode, ValidationMode, ValidationTicket, first_error_key,
    read_lock, write_lock,
};
use crate::value::{FieldKey, FieldValue, FormModel};

pub trait ValidationError: Clone + Send + Sync + 'static {
    fn message(&self) -> String;
}

impl ValidationError for String {
    fn message(&self) -> String {
        self.clone()
    }
}

pub trait FieldValidator<M, E>: Send + Sync
where
    E: ValidationError,
{
    fn validate(&self, model: &M, value: &FieldValue) -> Result<(), E>;
}

impl<M, E, F> FieldValidator<M, E> for F
where
    E: ValidationError,
    F: for<'a> Fn(&'a M, &'a FieldValue) -> Result<(), E> + Send + Sync,
{
    fn validate(&self, model: &M, value: &FieldValue) -> Result<(), E> {
        (self)(model, value)
    }
}

pub trait FormValidator<M, E>: Send + Sync
where
    E: ValidationError,
{
    fn validate(&self, model: &M) -> Vec<(FieldKey, E)>;
}

impl<M, E, F> FormValidator<M, E> for F
where
    E: ValidationError,
    F: Fn(&M) -> Vec<(FieldKey, E)> + Send + Sync,
{
    fn validate(&self, model: &M) -> Vec<(FieldKey, E)> {
        (self)(model)
    }
}

pub type BoxedValidationFuture<'a, E> = Pin<Box<dyn Future<Output = Result<(), E>> + Send + 'a>>;

pub trait AsyncFieldValidator<M, E>: Send + Sync
where
    E: ValidationError,
{
    type Fut<'a>: Future<Output = Result<(), E>> + Send + 'a
    where
        Self: 'a,
        M: 'a;

    fn validate<'a>(&'a self, model: &'a M, value: &'a FieldValue) -> Self::Fut<'a>;
}

impl<M, E, F> AsyncFieldValidator<M, E> for F
where
    E: ValidationError,
    F: for<'a> Fn(&'a M, &'a FieldValue) -> BoxedValidationFuture<'a, E> + Send + Sync,
{
    type Fut<'a>
        = BoxedValidationFuture<'a, E>
    where
        Self: 'a,
        M: 'a;

    fn validate<'a>(&'a self, model: &'a M, value: &'a FieldValue) -> Self::Fut<'a> {
        (self)(model, value)
    }
}

pub(crate) type SyncFieldValidatorFn<M, E> =
    Arc<dyn Fn(&M, &FieldValue) -> Result<(), E> + Send + Sync>;
pub(crate) type SyncFormValidatorFn<M, E> = Arc<dyn Fn(&M) -> Vec<(FieldKey, E)> + Send + Sync>;
pub(crate) type AsyncFieldValidatorFn<M, E> = Arc<
    dyn Fn(M, FieldValue) -> Pin<Box<dyn Future<Output = Result<(), E>> + Send + 'static>>
        + Send
        + Sync,
>;

pub(crate) struct AsyncFieldValidatorEntry<M, E> {
    pub(crate) debounce: Duration,
    pub(crate) validator: AsyncFieldValidatorFn<M, E>,
}

impl<M, E> Clone for AsyncFieldValidatorEntry<M, E> {
    fn clone(&self) -> Self {
        Self {
            debounce: self.debounce,
            validator: self.validator.clone(),
        }
    }
}

pub struct ValidationSchema<M, E> {
    pub(crate) field_validators: BTreeMap<FieldKey, Vec<SyncFieldValidatorFn<M, E>>>,
    pub(crate) async_field_validators: BTreeMap<FieldKey, Vec<AsyncFieldValidatorEntry<M, E>>>,
    pub(crate) form_validators: Vec<SyncFormValidatorFn<M, E>>,
    pub(crate) dependencies: BTreeMap<FieldKey, BTreeSet<FieldKey>>,
}

impl<M, E> ValidationSchema<M, E> {
    pub fn empty() -> Self {
        Self {
            field_validators: BTreeMap::new(),
            async_field_validators: BTreeMap::new(),
            form_validators: Vec::new(),
            dependencies: BTreeMap::new(),
        }
    }

    pub fn builder() -> SchemaBuilder<M, E> {
        SchemaBuilder {
            schema: Self::empty(),
        }
    }

    pub fn field_keys(&self) -> BTreeSet<FieldKey> {
        let mut keys = BTreeSet::new();
        keys.extend(self.field_validators.keys().cloned());
        keys.extend(self.async_field_validators.keys().cloned());
        keys
    }

    pub fn is_empty(&self) -> bool {
        self.field_validators.is_empty()
            && self.async_field_validators.is_empty()
            && self.form_validators.is_empty()
    }
}

impl<M, E> Default for ValidationSchema<M, E> {
    fn default() -> Self {
        Self::empty()
    }
}

pub struct SchemaBuilder<M, E> {
    schema: ValidationSchema<M, E>,
}

impl<M, E> SchemaBuilder<M, E>
where
    M: FormModel,
    E: ValidationError,
{
    pub fn field<V>(mut self, key: impl Into<FieldKey>, validator: V) -> Self
    where
        V: FieldValidator<M, E> + 'static,
    {
        let validator = Arc::new(validator);
        let wrapped: SyncFieldValidatorFn<M, E> =
            Arc::new(move |model: &M, value: &FieldValue| validator.validate(model, value));
        self.schema
            .field_validators
            .entry(key.into())
            .or_default()
            .push(wrapped);
        self
    }

    pub fn required(self, key: impl Into<FieldKey>, error: E) -> Self {
        self.field(key, move |_model: &M, value: &FieldValue| {
            if value.is_empty() {
                Err(error.clone())
            } else {
                Ok(())
            }
        })
    }

    pub fn field_async<V>(self, key: impl Into<FieldKey>, validator: V) -> Self
    where
        V: AsyncFieldValidator<M, E> + 'static,
    {
        self.field_async_debounced(key, 0, validator)
    }

    pub fn field_async_debounced<V>(
        mut self,
        key: impl Into<FieldKey>,
        debounce_ms: u64,
        validator: V,
    ) -> Self
    where
        V: AsyncFieldValidator<M, E> + 'static,
    {
        let validator = Arc::new(validator);
        let wrapped: AsyncFieldValidatorFn<M, E> = Arc::new(move |model: M, value: FieldValue| {
            let validator = validator.clone();
            Box::pin(async move { validator.validate(&model, &value).await })
        });
        let entry = AsyncFieldValidatorEntry {
            debounce: Duration::from_millis(debounce_ms),
            validator: wrapped,
        };
        self.schema
            .async_field_validators
            .entry(key.into())
            .or_default()
            .push(entry);
        self
    }

    pub fn form<V>(mut self, validator: V) -> Self
    where
        V: FormValidator<M, E> + 'static,
    {
        let validator = Arc::new(validator);
        let wrapped: SyncFormValidatorFn<M, E> = Arc::new(move |model: &M| validator.validate(model));
        self.schema.form_validators.push(wrapped);
        self
    }

    pub fn dependency(mut self, source: impl Into<FieldKey>, dependent: impl Into<FieldKey>) -> Self {
        self.schema
            .dependencies
            .entry(source.into())
            .or_default()
            .insert(dependent.into());
        self
    }

    pub fn build(self) -> ValidationSchema<M, E> {
        self.schema
    }
}

impl<M, E> FormController<M, E>
where
    M: FormModel,
    E: ValidationError,
{
    pub fn set(&self, key: impl Into<FieldKey>, value: impl Into<FieldValue>) -> FormResult<()> {
        let key = key.into();
        let value = value.into();
        {
            let mut state = write_lock(&self.state, "writing form model")?;
            if !state.model.set_field(&key, value) {
                log::warn!("form update ignored for unknown field `{key}`");
                return Ok(());
            }
            let is_dirty = state.model.field(&key) != state.initial_model.field(&key);
            if is_dirty {
                state.dirty_fields.insert(key.clone());
            } else {
                state.dirty_fields.remove(&key);
            }
            state.ensure_meta(key.clone()).dirty = is_dirty;
        }

        if self.options.validate_mode == ValidationMode::OnChange {
            let _ = self.validate_field_by_key(&key)?;
        }
        if self.options.revalidate_mode == RevalidateMode::OnChange {
            self.revalidate_dependents(&key)?;
        }
        Ok(())
    }

    pub fn touch(&self, key: impl Into<FieldKey>) -> FormResult<()> {
        let key = key.into();
        {
            let mut state = write_lock(&self.state, "touching field")?;
            state.ensure_meta(key.clone()).touched = true;
        }

        if self.options.validate_mode == ValidationMode::OnBlur {
            let _ = self.validate_field_by_key(&key)?;
        }
        if self.options.revalidate_mode == RevalidateMode::OnBlur {
            self.revalidate_dependents(&key)?;
        }
        Ok(())
    }

    pub async fn set_async(
        &self,
        key: impl Into<FieldKey>,
        value: impl Into<FieldValue>,
    ) -> FormResult<()> {
        let key = key.into();
        self.set(key.clone(), value)?;
        if self.options.validate_mode == ValidationMode::OnChange {
            let _ = self.validate_field_async_registered_by_key(&key).await?;
        }
        if self.options.revalidate_mode == RevalidateMode::OnChange {
            self.revalidate_dependents_async(&key).await?;
        }
        Ok(())
    }

    pub async fn touch_async(&self, key: impl Into<FieldKey>) -> FormResult<()> {
        let key = key.into();
        self.touch(key.clone())?;
        if self.options.validate_mode == ValidationMode::OnBlur {
            let _ = self.validate_field_async_registered_by_key(&key).await?;
        }
        if self.options.revalidate_mode == RevalidateMode::OnBlur {
            self.revalidate_dependents_async(&key).await?;
        }
        Ok(())
    }

    pub fn validate_field(&self, key: impl Into<FieldKey>) -> FormResult<bool> {
        self.validate_field_by_key(&key.into())
    }

    pub fn validate_form(&self) -> FormResult<bool> {
        let model = {
            read_lock(&self.state, "reading model for form validation")?
                .model
                .clone()
        };

        let mut field_errors = BTreeMap::<FieldKey, Vec<E>>::new();
        for (key, validators) in &self.schema.field_validators {
            let value = model.field(key).unwrap_or_default();
            let mut errors = Vec::new();
            for validator in validators {
                if let Err(error) = validator(&model, &value) {
                    errors.push(error);
                    if self.options.validate_first_error_only {
                        break;
                    }
                }
            }
            field_errors.insert(key.clone(), errors);
        }

        for validator in &self.schema.form_validators {
            for (key, error) in validator(&model) {
                field_errors.entry(key).or_default().push(error);
            }
        }

        {
            let mut state = write_lock(&self.state, "applying form validation result")?;
            let mut keys = state
                .field_meta
                .keys()
                .cloned()
                .collect::<BTreeSet<FieldKey>>();
            keys.extend(field_errors.keys().cloned());
            for key in keys {
                let meta = state.ensure_meta(key.clone());
                meta.validating = false;
                meta.errors = field_errors.remove(&key).unwrap_or_default();
            }
            state.first_error = first_error_key(&state.field_meta);
        }

        Ok(self.snapshot()?.is_valid)
    }

    pub async fn validate_form_async(&self) -> FormResult<bool> {
        let _ = self.validate_form()?;
        let keys = self
            .schema
            .async_field_validators
            .keys()
            .cloned()
            .collect::<Vec<_>>();

        for key in keys {
            let _ = self.validate_field_async_registered_by_key(&key).await?;
        }

        Ok(self.snapshot()?.is_valid)
    }

    pub async fn validate_field_async<V>(
        &self,
        key: impl Into<FieldKey>,
        validator: &V,
    ) -> FormResult<ValidationTicket>
    where
        V: AsyncFieldValidator<M, E>,
    {
        let key = key.into();
        let (ticket, model, value) = {
            let mut state = write_lock(&self.state, "starting async validation")?;
            let next = ValidationTicket(
                state
                    .tickets
                    .get(&key)
                    .copied()
                    .unwrap_or(ValidationTicket(0))
                    .0
                    + 1,
            );
            state.tickets.insert(key.clone(), next);
            state.ensure_meta(key.clone()).validating = true;
            let value = state.model.field(&key).unwrap_or_default();
            (next, state.model.clone(), value)
        };

        let result = validator.validate(&model, &value).await;
        self.finish_async_validation(&key, ticket, result)?;
        Ok(ticket)
    }

    pub async fn validate_field_async_registered(
        &self,
        key: impl Into<FieldKey>,
    ) -> FormResult<Vec<ValidationTicket>> {
        self.validate_field_async_registered_by_key(&key.into())
            .await
    }

    pub(crate) async fn validate_field_async_registered_by_key(
        &self,
        key: &FieldKey,
    ) -> FormResult<Vec<ValidationTicket>> {
        let model = {
            read_lock(&self.state, "reading model for registered async validation")?
                .model
                .clone()
        };
        let entries = self
            .schema
            .async_field_validators
            .get(key)
            .cloned()
            .unwrap_or_default();

        let mut tickets = Vec::with_capacity(entries.len());
        for entry in entries {
            let ticket = {
                let mut state = write_lock(&self.state, "starting registered async validation")?;
                let next = ValidationTicket(
                    state
                        .tickets
                        .get(key)
                        .copied()
                        .unwrap_or(ValidationTicket(0))
                        .0
                        + 1,
                );
                state.tickets.insert(key.clone(), next);
                state.ensure_meta(key.clone()).validating = true;
                next
            };

            if !entry.debounce.is_zero() {
                Delay::new(entry.debounce).await;
                if !self.is_latest_ticket(key, ticket)? {
                    continue;
                }
            }

            let value = model.field(key).unwrap_or_default();
            let result = (entry.validator)(model.clone(), value).await;
            self.finish_async_validation(key, ticket, result)?;
            tickets.push(ticket);
        }
        Ok(tickets)
    }

    pub(crate) fn validate_field_by_key(&self, key: &FieldKey) -> FormResult<bool> {
        let model = {
            read_lock(&self.state, "reading model for field validation")?
                .model
                .clone()
        };
        let validators = self
            .schema
            .field_validators
            .get(key)
            .cloned()
            .unwrap_or_default();

        let value = model.field(key).unwrap_or_default();
        let mut errors = Vec::new();
        for validator in validators {
            if let Err(error) = validator(&model, &value) {
                errors.push(error);
                if self.options.validate_first_error_only {
                    break;
                }
            }
        }

        let mut state = write_lock(&self.state, "writing field validation result")?;
        let meta = state.ensure_meta(key.clone());
        meta.validating = false;
        meta.errors = errors;
        state.first_error = first_error_key(&state.field_meta);
        Ok(state
            .field_meta
            .get(key)
            .is_none_or(|meta| meta.errors.is_empty()))
    }

    pub(crate) fn revalidate_dependents(&self, source: &FieldKey) -> FormResult<()> {
        let dependents = self
            .schema
            .dependencies
            .get(source)
            .cloned()
            .unwrap_or_default();
        for dependent in dependents {
            let _ = self.validate_field_by_key(&dependent)?;
        }
        Ok(())
    }

    pub(crate) async fn revalidate_dependents_async(&self, source: &FieldKey) -> FormResult<()> {
        let dependents = self
            .schema
            .dependencies
            .get(source)
            .cloned()
            .unwrap_or_default();
        for dependent in dependents {
            let _ = self.validate_field_async_registered_by_key(&dependent).await?;
        }
        Ok(())
    }

    fn is_latest_ticket(&self, key: &FieldKey, ticket: ValidationTicket) -> FormResult<bool> {
        Ok(read_lock(&self.state, "checking latest validation ticket")?
            .tickets
            .get(key)
            .copied()
            == Some(ticket))
    }

    fn finish_async_validation(
        &self,
        key: &FieldKey,
        ticket: ValidationTicket,
        result: Result<(), E>,
    ) -> FormResult<()> {
        let mut state = write_lock(&self.state, "finishing async validation")?;
        if state.tickets.get(key).copied() != Some(ticket) {
            return Ok(());
        }
        let meta = state.ensure_meta(key.clone());
        meta.validating = false;
        meta.errors = match result {
            Ok(()) => Vec::new(),
            Err(error) => vec![error],
        };
        state.first_error = first_error_key(&state.field_meta);
        Ok(())
    }
}
