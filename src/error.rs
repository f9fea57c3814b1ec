use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Path(#[from] derivation_path::Error),

    // Wallet construction

    #[error("missing root derivation path")]
    MissingRootPath,

    #[error("invalid root derivation path: expected {expected} hardened elements")]
    InvalidRootPath { expected: usize },

    #[error("missing mnemonic")]
    MissingMnemonic,

    #[error("blinding mnemonic is invalid")]
    InvalidMnemonic,

    #[error("entropy size must be 128 or 256")]
    InvalidEntropySize,

    #[error("missing cosigner(s) xpub")]
    MissingCosignerXpubs,

    #[error("invalid cosigner xpub")]
    InvalidXpub,

    #[error("missing signing master key")]
    WalletNotInitialized,

    #[error("key derivation failed: {0}")]
    KeyDerivation(String),

    // Key derivation arguments

    #[error("account index must be in hardened range [0', 2147483647']")]
    InvalidAccountIndex,

    #[error("derivation path must be a relative path in the form \"account'/branch/index\"")]
    InvalidSingleSigPathLength,

    #[error("derivation path's account (first elem) must be hardened (suffix ')")]
    UnhardenedAccount,

    #[error("derivation path must be a relative path in the form \"branch/index\"")]
    InvalidMultiSigPathLength,

    #[error("derivation path for keys must be in format <chain>/<index>, ie 0/0")]
    HardenedMultiSigPath,

    #[error("missing output script")]
    MissingOutputScript,

    #[error("invalid config: {0}")]
    Config(String),

    // Inputs and outputs

    #[error("input is missing txid")]
    InputMissingTxid,

    #[error("invalid input txid length: must be exactly 32 bytes")]
    InputInvalidTxid,

    #[error("invalid input {field}: {reason}")]
    InputInvalidField { field: &'static str, reason: String },

    #[error("output is missing asset")]
    OutputMissingAsset,

    #[error("invalid output asset length: must be exactly 32 bytes")]
    OutputInvalidAsset,

    #[error("invalid output script")]
    OutputInvalidScript,

    #[error("invalid output blinding key")]
    OutputInvalidBlindingKey,

    #[error("invalid input {index}: {source}")]
    InvalidInput {
        index: usize,
        #[source]
        source: Box<Error>,
    },

    #[error("invalid output {index}: {source}")]
    InvalidOutput {
        index: usize,
        #[source]
        source: Box<Error>,
    },

    // PSET pipeline

    #[error("missing pset base64")]
    MissingPset,

    #[error("PSET decode error: {0}")]
    PsetDecode(String),

    #[error("at least one input is mandatory to create a partial transaction with one or more confidential outputs")]
    MissingInputs,

    #[error("output {index} has blinder index {blinder_index} but only {inputs} inputs exist")]
    BlinderIndexOutOfRange {
        index: usize,
        blinder_index: u32,
        inputs: usize,
    },

    #[error("missing list of owned inputs")]
    MissingOwnedInputs,

    #[error("input index to blind is out of range")]
    BlindInputOutOfRange,

    #[error("failed to unblind not owned input {index} with given blinding key generated by prevout script {script}")]
    UnblindMismatch { index: usize, script: String },

    #[error("failed to unblind owned input {index}: {reason}")]
    Unblind { index: usize, reason: String },

    #[error("blinding error: {0}")]
    Blinding(String),

    #[error("missing derivation path map")]
    MissingDerivationPaths,

    #[error("invalid derivation path '{path}' for script '{script}': {source}")]
    InvalidDerivationPath {
        path: String,
        script: String,
        #[source]
        source: Box<Error>,
    },

    #[error("missing derivation path")]
    MissingDerivationPath,

    #[error("missing prevouts")]
    MissingPrevouts,

    #[error("input index {0} out of range")]
    InputIndexOutOfRange(usize),

    #[error("input {0} is missing its witness utxo")]
    MissingWitnessUtxo(usize),

    #[error("unsupported script for input {index}: {reason}")]
    UnsupportedScript { index: usize, reason: String },

    #[error("sighash error: {0}")]
    Sighash(String),

    #[error("signature verification failed for input {0}")]
    SignatureVerification(usize),

    #[error("transaction contains invalid signature(s)")]
    InvalidSignatures,

    #[error("input {index} cannot be finalized: {reason}")]
    Finalize { index: usize, reason: String },

    #[error("transaction extraction failed: {0}")]
    Extract(String),

    #[error("transaction decode error: {0}")]
    TxDecode(String),
}

pub type Result<T> = std::result::Result<T, Error>;
