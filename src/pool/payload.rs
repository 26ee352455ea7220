//! The unit of transfer between stages.

use crate::context::Context;
use crate::error::StageError;

/// Context plus either a data value or an error.
///
/// Owned by whichever channel or executor currently holds it; never shared.
#[derive(Debug)]
pub struct Payload<T> {
    context: Context,
    error: Option<StageError>,
    data: Option<T>,
}

impl<T> Payload<T> {
    pub fn data(context: Context, value: T) -> Self {
        Self {
            context,
            error: None,
            data: Some(value),
        }
    }

    pub fn error(context: Context, error: StageError) -> Self {
        Self {
            context,
            error: Some(error),
            data: None,
        }
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    pub fn has_error(&self) -> bool {
        self.error.is_some()
    }

    pub fn into_parts(self) -> (Context, Option<StageError>, Option<T>) {
        (self.context, self.error, self.data)
    }
}
