use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{Display, Formatter};
use std::future::Future;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::validation::{ValidationError, ValidationSchema};
use crate::value::{FieldKey, FormModel};

#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct ValidationTicket(pub u64);

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SubmitState {
    Idle,
    Validating,
    Submitting,
    Succeeded,
    Failed,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ValidationMode {
    OnChange,
    OnBlur,
    OnSubmit,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RevalidateMode {
    OnChange,
    OnBlur,
    OnSubmit,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct FormOptions {
    pub validate_mode: ValidationMode,
    pub revalidate_mode: RevalidateMode,
    pub validate_first_error_only: bool,
}

impl Default for FormOptions {
    fn default() -> Self {
        Self {
            validate_mode: ValidationMode::OnSubmit,
            revalidate_mode: RevalidateMode::OnChange,
            validate_first_error_only: false,
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FieldMeta<E> {
    pub dirty: bool,
    pub touched: bool,
    pub validating: bool,
    pub errors: Vec<E>,
}

impl<E> Default for FieldMeta<E> {
    fn default() -> Self {
        Self {
            dirty: false,
            touched: false,
            validating: false,
            errors: Vec::new(),
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SubmitError(String);

impl SubmitError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }

    pub fn message(&self) -> &str {
        &self.0
    }
}

impl Display for SubmitError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for SubmitError {}

impl From<&str> for SubmitError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

impl From<String> for SubmitError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum SubmitOutcome {
    Invalid,
    Submitted,
    Failed(SubmitError),
}

#[derive(Clone, Debug)]
pub struct FormSnapshot<M, E> {
    pub model: M,
    pub submit_state: SubmitState,
    pub submit_count: u32,
    pub submit_error: Option<SubmitError>,
    pub is_dirty: bool,
    pub is_valid: bool,
    pub field_meta: BTreeMap<FieldKey, FieldMeta<E>>,
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum FormError {
    StatePoisoned(&'static str),
    InvalidStateTransition { from: SubmitState, to: SubmitState },
    AlreadySubmitting,
}

impl Display for FormError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            FormError::StatePoisoned(context) => {
                write!(f, "form state lock poisoned while {context}")
            }
            FormError::InvalidStateTransition { from, to } => {
                write!(f, "invalid submit state transition: {from:?} -> {to:?}")
            }
            FormError::AlreadySubmitting => f.write_str("form submit is already in progress"),
        }
    }
}

impl std::error::Error for FormError {}

pub type FormResult<T> = Result<T, FormError>;

pub(crate) struct FormState<M, E> {
    pub(crate) initial_model: M,
    pub(crate) model: M,
    pub(crate) submit_state: SubmitState,
    pub(crate) submit_count: u32,
    pub(crate) submit_error: Option<SubmitError>,
    pub(crate) dirty_fields: BTreeSet<FieldKey>,
    pub(crate) field_meta: BTreeMap<FieldKey, FieldMeta<E>>,
    pub(crate) tickets: BTreeMap<FieldKey, ValidationTicket>,
    pub(crate) first_error: Option<FieldKey>,
}

impl<M, E> FormState<M, E> {
    pub(crate) fn ensure_meta(&mut self, key: FieldKey) -> &mut FieldMeta<E> {
        self.field_meta.entry(key).or_default()
    }
}

#[derive(Clone)]
pub struct FormController<M, E>
where
    M: FormModel,
    E: ValidationError,
{
    pub(crate) options: FormOptions,
    pub(crate) schema: Arc<ValidationSchema<M, E>>,
    pub(crate) state: Arc<RwLock<FormState<M, E>>>,
}

impl<M, E> FormController<M, E>
where
    M: FormModel,
    E: ValidationError,
{
    pub fn new(initial: M, schema: ValidationSchema<M, E>, options: FormOptions) -> Self {
        Self {
            options,
            schema: Arc::new(schema),
            state: Arc::new(RwLock::new(FormState {
                initial_model: initial.clone(),
                model: initial,
                submit_state: SubmitState::Idle,
                submit_count: 0,
                submit_error: None,
                dirty_fields: BTreeSet::new(),
                field_meta: BTreeMap::new(),
                tickets: BTreeMap::new(),
                first_error: None,
            })),
        }
    }

    pub fn form_data(&self) -> FormResult<M> {
        Ok(read_lock(&self.state, "reading form data")?.model.clone())
    }

    pub fn form_errors(&self) -> FormResult<BTreeMap<FieldKey, Vec<E>>> {
        let state = read_lock(&self.state, "reading form errors")?;
        Ok(state
            .field_meta
            .iter()
            .filter(|(_, meta)| !meta.errors.is_empty())
            .map(|(key, meta)| (key.clone(), meta.errors.clone()))
            .collect())
    }

    pub fn is_submitting(&self) -> FormResult<bool> {
        Ok(read_lock(&self.state, "reading submit flag")?.submit_state == SubmitState::Submitting)
    }

    pub fn submit_state(&self) -> FormResult<SubmitState> {
        Ok(read_lock(&self.state, "reading submit state")?.submit_state)
    }

    pub fn first_invalid_field(&self) -> FormResult<Option<FieldKey>> {
        Ok(read_lock(&self.state, "reading first invalid field")?
            .first_error
            .clone())
    }

    pub fn submit(
        &self,
        f: impl FnOnce(&M) -> Result<(), SubmitError> + 'static,
    ) -> FormResult<SubmitOutcome> {
        {
            let mut state = write_lock(&self.state, "preparing submit")?;
            if state.submit_state == SubmitState::Submitting {
                return Err(FormError::AlreadySubmitting);
            }
            transition_submit_state(&mut state, SubmitState::Validating)?;
            state.submit_count = state.submit_count.saturating_add(1);
            state.submit_error = None;
        }

        let is_valid = self.validate_form()?;
        if !is_valid {
            let mut state = write_lock(&self.state, "handling submit validation failure")?;
            transition_submit_state(&mut state, SubmitState::Failed)?;
            return Ok(SubmitOutcome::Invalid);
        }

        let model = {
            let mut state = write_lock(&self.state, "moving submit state to submitting")?;
            transition_submit_state(&mut state, SubmitState::Submitting)?;
            state.model.clone()
        };
        let submit_result = f(&model);

        let mut state = write_lock(&self.state, "completing submit")?;
        self.finish_submit(&mut state, submit_result)
    }

    pub async fn submit_async<F, Fut>(&self, f: F) -> FormResult<SubmitOutcome>
    where
        F: FnOnce(&M) -> Fut + 'static,
        Fut: Future<Output = Result<(), SubmitError>> + Send + 'static,
    {
        {
            let mut state = write_lock(&self.state, "preparing async submit")?;
            if state.submit_state == SubmitState::Submitting {
                return Err(FormError::AlreadySubmitting);
            }
            transition_submit_state(&mut state, SubmitState::Validating)?;
            state.submit_count = state.submit_count.saturating_add(1);
            state.submit_error = None;
        }

        let is_valid = self.validate_form_async().await?;
        if !is_valid {
            let mut state = write_lock(&self.state, "handling async submit validation failure")?;
            transition_submit_state(&mut state, SubmitState::Failed)?;
            return Ok(SubmitOutcome::Invalid);
        }

        let model = {
            let mut state = write_lock(&self.state, "moving async submit state to submitting")?;
            transition_submit_state(&mut state, SubmitState::Submitting)?;
            state.model.clone()
        };
        let submit_result = f(&model).await;

        let mut state = write_lock(&self.state, "completing async submit")?;
        self.finish_submit(&mut state, submit_result)
    }

    fn finish_submit(
        &self,
        state: &mut FormState<M, E>,
        submit_result: Result<(), SubmitError>,
    ) -> FormResult<SubmitOutcome> {
        match submit_result {
            Ok(()) => {
                transition_submit_state(state, SubmitState::Succeeded)?;
                Ok(SubmitOutcome::Submitted)
            }
            Err(error) => {
                log::error!("form submission failed: {error}");
                transition_submit_state(state, SubmitState::Failed)?;
                state.submit_error = Some(error.clone());
                Ok(SubmitOutcome::Failed(error))
            }
        }
    }

    pub fn reset_to_initial(&self) -> FormResult<()> {
        let mut state = write_lock(&self.state, "resetting form")?;
        state.model = state.initial_model.clone();
        state.submit_state = SubmitState::Idle;
        state.submit_error = None;
        state.dirty_fields.clear();
        state.tickets.clear();
        state.first_error = None;
        for meta in state.field_meta.values_mut() {
            meta.dirty = false;
            meta.touched = false;
            meta.validating = false;
            meta.errors.clear();
        }
        Ok(())
    }

    pub fn reset_field(&self, key: impl Into<FieldKey>) -> FormResult<()> {
        let key = key.into();
        let mut state = write_lock(&self.state, "resetting field")?;
        let initial_value = state.initial_model.field(&key).unwrap_or_default();
        state.model.set_field(&key, initial_value);
        state.dirty_fields.remove(&key);
        let meta = state.ensure_meta(key);
        meta.dirty = false;
        meta.touched = false;
        meta.validating = false;
        meta.errors.clear();
        state.first_error = first_error_key(&state.field_meta);
        Ok(())
    }

    pub fn clear_errors(&self) -> FormResult<()> {
        let mut state = write_lock(&self.state, "clearing all field errors")?;
        for meta in state.field_meta.values_mut() {
            meta.errors.clear();
            meta.validating = false;
        }
        state.first_error = None;
        Ok(())
    }

    pub fn clear_field_errors(&self, key: &str) -> FormResult<()> {
        let mut state = write_lock(&self.state, "clearing field errors")?;
        if let Some(meta) = state.field_meta.get_mut(key) {
            meta.errors.clear();
            meta.validating = false;
        }
        state.first_error = first_error_key(&state.field_meta);
        Ok(())
    }

    pub fn snapshot(&self) -> FormResult<FormSnapshot<M, E>> {
        let state = read_lock(&self.state, "creating form snapshot")?;
        let is_valid = state.field_meta.values().all(|meta| meta.errors.is_empty());
        Ok(FormSnapshot {
            model: state.model.clone(),
            submit_state: state.submit_state,
            submit_count: state.submit_count,
            submit_error: state.submit_error.clone(),
            is_dirty: !state.dirty_fields.is_empty(),
            is_valid,
            field_meta: state.field_meta.clone(),
        })
    }

    pub fn field_meta(&self, key: &str) -> FormResult<Option<FieldMeta<E>>> {
        Ok(read_lock(&self.state, "reading field meta")?
            .field_meta
            .get(key)
            .cloned())
    }

    pub fn field_error_for_display(&self, key: &str) -> FormResult<Option<String>> {
        let state = read_lock(&self.state, "reading display error message")?;
        let Some(meta) = state.field_meta.get(key) else {
            return Ok(None);
        };
        if !meta.touched && state.submit_count == 0 {
            return Ok(None);
        }
        Ok(meta.errors.first().map(ValidationError::message))
    }
}

pub(crate) fn transition_submit_state<M, E>(
    state: &mut FormState<M, E>,
    next: SubmitState,
) -> FormResult<()> {
    let current = state.submit_state;
    if current == next {
        return Ok(());
    }

    let allowed = matches!(
        (current, next),
        (SubmitState::Idle, SubmitState::Validating)
            | (SubmitState::Validating, SubmitState::Submitting)
            | (SubmitState::Validating, SubmitState::Failed)
            | (SubmitState::Submitting, SubmitState::Succeeded)
            | (SubmitState::Submitting, SubmitState::Failed)
            | (SubmitState::Succeeded, SubmitState::Validating)
            | (SubmitState::Failed, SubmitState::Validating)
            | (_, SubmitState::Idle)
    );
    if !allowed {
        return Err(FormError::InvalidStateTransition {
            from: current,
            to: next,
        });
    }
    state.submit_state = next;
    Ok(())
}

pub(crate) fn first_error_key<E>(
    field_meta: &BTreeMap<FieldKey, FieldMeta<E>>,
) -> Option<FieldKey> {
    field_meta
        .iter()
        .find_map(|(key, meta)| (!meta.errors.is_empty()).then(|| key.clone()))
}

pub(crate) fn read_lock<'a, T>(
    lock: &'a RwLock<T>,
    context: &'static str,
) -> FormResult<RwLockReadGuard<'a, T>> {
    lock.read().map_err(|_| FormError::StatePoisoned(context))
}

pub(crate) fn write_lock<'a, T>(
    lock: &'a RwLock<T>,
    context: &'static str,
) -> FormResult<RwLockWriteGuard<'a, T>> {
    lock.write().map_err(|_| FormError::StatePoisoned(context))
}
