// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![warn(clippy::mod_module_files, clippy::pedantic, clippy::unwrap_used)]

pub mod hir {
    pub use qlc_hir::{hir::*, visit};
}

pub mod runtime_capabilities {
    pub use qlc_passes::runtime_capabilities_analysis::{
        callable_capability, check_runtime_capabilities, infer_capabilities, scope_diagnostics,
        scope_patterns, specialization_capability, AnalysisContext, Error, Pattern,
        RuntimeCapability, UnknownCapability, CAPABILITY_ATTR,
    };
}

pub use qlc_data_structures::span::Span;
