//! # Reglet Capability
//!
//! `reglet_capability` implements the consent side of the capability
//! lifecycle: the pure policy engine that admits or denies runtime requests,
//! the extractors that infer what a plugin will need from its configuration
//! and manifest, the risk analyzer that classifies those needs, the
//! gatekeeper that mediates between required grants, stored grants and the
//! user, and the file-backed grant store that persists decisions.
//!
//! Key concepts:
//!
//! 1. **Policy**: a side-effect-free evaluator of typed requests against a
//!    [`reglet_core::GrantSet`]; the `check_*` variants additionally report
//!    denials to a handler.
//!
//! 2. **Gatekeeper**: diffs required against stored grants, prompts under a
//!    configurable security level, and persists approvals the user marks as
//!    permanent.
//!
//! 3. **Extractor**: plugin-kind-specific logic deriving a required grant
//!    set from untyped configuration, because the manifest is only an upper
//!    bound.

pub mod extract;
pub mod gatekeeper;
pub mod policy;
pub mod risk;
pub mod store;

pub use extract::{CapabilityExtractor, ExtractorRegistry, TemplateEngine};
pub use gatekeeper::{
    CapabilityInfo, Gatekeeper, PromptDecision, PromptRequest, Prompter, SecurityLevel,
    TerminalPrompter,
};
pub use policy::{DenialHandler, NopDenialHandler, Policy, TracingDenialHandler};
pub use risk::{analyze_risk, RiskFactor, RiskLevel, RiskReport};
pub use store::{FileGrantStore, GrantStore};
