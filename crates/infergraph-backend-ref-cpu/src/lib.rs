//! Reference CPU backend: portable, type-specialized workloads registered
//! under [`CPU_REF`].

mod layout;
pub mod workloads;

use infergraph::backend::{register_backend, Backend, BackendId};
use infergraph::workload::WorkloadRegistry;
use tracing::debug;

pub use workloads::{
    ElementAdd, RefAdditionWorkload, RefInputWorkload, RefOutputWorkload, RefPermuteWorkload,
    RefReshapeWorkload, RefTransposeWorkload,
};

/// Identifier the reference backend registers under.
pub const CPU_REF: &str = "CpuRef";

#[derive(Debug, Clone, Copy, Default)]
pub struct RefBackend;

impl RefBackend {
    /// Workload registry holding only this backend's workloads.
    pub fn registry() -> WorkloadRegistry {
        WorkloadRegistry::for_backend(&RefBackend)
    }
}

impl Backend for RefBackend {
    fn id(&self) -> BackendId {
        BackendId::new(CPU_REF)
    }

    fn register_workloads(&self, registry: &mut WorkloadRegistry) {
        let backend = self.id();
        workloads::register_all(registry, &backend);
        debug!(backend = %backend, workloads = registry.len(), "registered reference workloads");
    }
}

/// Adds [`RefBackend`] to the global backend registry under [`CPU_REF`].
///
/// Runs from a load-time initializer on Linux; calling it again only
/// replaces the constructor.
pub fn register_cpu_ref_backend() {
    register_backend(CPU_REF, || Box::new(RefBackend));
}

// Auto-register on library load
#[cfg(target_os = "linux")]
#[used]
#[link_section = ".init_array"]
static REGISTER_CPU_REF_BACKEND: extern "C" fn() = {
    extern "C" fn register() {
        register_cpu_ref_backend();
    }
    register
};
