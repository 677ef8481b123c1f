use thiserror::Error;

/// Errors raised by tensor construction and the PS-RoI kernels.
///
/// Every variant carries the name of the operation that rejected its inputs.
/// Kernels validate all of their arguments before allocating any output, so an
/// error always means nothing was computed.
#[derive(Error, Debug, Clone)]
pub enum TensorError {
    #[error("Shape mismatch in operation '{operation}': expected {expected}, got {got}")]
    ShapeMismatch {
        operation: String,
        expected: String,
        got: String,
        context: Option<ErrorContext>,
    },

    #[error("Invalid shape in operation '{operation}': {reason}")]
    InvalidShape {
        operation: String,
        reason: String,
        shape: Option<Vec<usize>>,
        context: Option<ErrorContext>,
    },

    #[error("Invalid argument in operation '{operation}': {reason}")]
    InvalidArgument {
        operation: String,
        reason: String,
        context: Option<ErrorContext>,
    },

    #[error(
        "Invalid batch index in operation '{operation}': roi {roi_index} references batch {batch_index}, batch size is {batch_size}"
    )]
    InvalidBatchIndex {
        operation: String,
        roi_index: usize,
        batch_index: f64,
        batch_size: usize,
        context: Option<ErrorContext>,
    },
}

/// Additional context information for errors
#[derive(Debug, Clone, Default)]
pub struct ErrorContext {
    /// Input tensor shapes
    pub input_shapes: Vec<Vec<usize>>,
    /// Output shape (if applicable)
    pub output_shape: Option<Vec<usize>>,
    /// Additional metadata
    pub metadata: std::collections::BTreeMap<String, String>,
}

impl ErrorContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add input tensor information
    pub fn with_input_shape(mut self, shape: &[usize]) -> Self {
        self.input_shapes.push(shape.to_vec());
        self
    }

    /// Add output shape information
    pub fn with_output_shape(mut self, shape: &[usize]) -> Self {
        self.output_shape = Some(shape.to_vec());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

impl TensorError {
    /// Create a shape mismatch error with context
    pub fn shape_mismatch(operation: &str, expected: &str, got: &str) -> Self {
        Self::ShapeMismatch {
            operation: operation.to_string(),
            expected: expected.to_string(),
            got: got.to_string(),
            context: None,
        }
    }

    /// Create an invalid shape error, recording the offending shape
    pub fn invalid_shape(operation: &str, reason: &str, shape: &[usize]) -> Self {
        Self::InvalidShape {
            operation: operation.to_string(),
            reason: reason.to_string(),
            shape: Some(shape.to_vec()),
            context: None,
        }
    }

    /// Create an invalid argument error with operation context
    pub fn invalid_argument_op(operation: &str, reason: &str) -> Self {
        Self::InvalidArgument {
            operation: operation.to_string(),
            reason: reason.to_string(),
            context: None,
        }
    }

    pub fn invalid_batch_index(
        operation: &str,
        roi_index: usize,
        batch_index: f64,
        batch_size: usize,
    ) -> Self {
        Self::InvalidBatchIndex {
            operation: operation.to_string(),
            roi_index,
            batch_index,
            batch_size,
            context: None,
        }
    }

    /// Add context to an existing error
    pub fn with_context(mut self, context: ErrorContext) -> Self {
        match &mut self {
            Self::ShapeMismatch { context: ctx, .. } => *ctx = Some(context),
            Self::InvalidShape { context: ctx, .. } => *ctx = Some(context),
            Self::InvalidArgument { context: ctx, .. } => *ctx = Some(context),
            Self::InvalidBatchIndex { context: ctx, .. } => *ctx = Some(context),
        }
        self
    }

    /// Get the operation name for this error
    pub fn operation(&self) -> &str {
        match self {
            Self::ShapeMismatch { operation, .. } => operation,
            Self::InvalidShape { operation, .. } => operation,
            Self::InvalidArgument { operation, .. } => operation,
            Self::InvalidBatchIndex { operation, .. } => operation,
        }
    }

    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            Self::ShapeMismatch { context, .. }
            | Self::InvalidShape { context, .. }
            | Self::InvalidArgument { context, .. }
            | Self::InvalidBatchIndex { context, .. } => context.as_ref(),
        }
    }
}

pub type Result<T> = std::result::Result<T, TensorError>;

/// Convert from scirs2_core::ndarray::ShapeError to TensorError
impl From<scirs2_core::ndarray::ShapeError> for TensorError {
    fn from(err: scirs2_core::ndarray::ShapeError) -> Self {
        Self::InvalidShape {
            operation: "tensor_creation".to_string(),
            reason: format!("Shape error: {err}"),
            shape: None,
            context: None,
        }
    }
}
