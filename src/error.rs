use thiserror::Error;

/// Everything that can go wrong while building or driving an autoencoder.
///
/// Construction-time problems (bad sizes, unknown names, conflicting layer
/// objectives) are reported when the model is built, never later during a
/// numeric call.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AutoencoderError {
    #[error("number of hidden units must be positive, got {0}")]
    InvalidHiddenSize(usize),

    #[error("number of visible units must be positive when initializing visible parameters")]
    InvalidVisibleSize,

    #[error("irange must be finite and non-negative, got {0}")]
    InvalidRange(String),

    #[error("couldn't interpret {field} value: '{name}'")]
    UnknownActivation { field: &'static str, name: String },

    #[error("invalid encoder activation function '{0}': not an elementwise function of its input")]
    NonElementwiseActivation(String),

    #[error("unknown regularization kind '{0}' (expected '', 'l1_penalty' or 'sqr_penalty')")]
    UnknownRegularization(String),

    #[error("invalid corruption setting: {0}")]
    InvalidCorruption(String),

    #[error("parameters of this model already initialized; create a new object instead")]
    AlreadyInitialized,

    #[error("model has no visible units yet; call set_visible_size first")]
    Uninitialized,

    #[error("input has {got} columns but the model expects {expected}")]
    ShapeMismatch { expected: usize, got: usize },

    #[error("a stack needs at least one hidden layer")]
    EmptyStack,

    #[error("per-layer value for `{field}` has {got} entries but the stack has {expected} layers")]
    LayerCountMismatch {
        field: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("can't specify denoising and contracting objectives simultaneously (layer {0})")]
    ConflictingObjectives(usize),

    #[error("layer {layer} produces {nhid} units but the next layer expects {next_nvis:?}")]
    LayerWidthMismatch {
        layer: usize,
        nhid: usize,
        next_nvis: Option<usize>,
    },

    #[error("gradient mismatch: {0}")]
    GradientMismatch(String),
}

pub type Result<T> = std::result::Result<T, AutoencoderError>;
