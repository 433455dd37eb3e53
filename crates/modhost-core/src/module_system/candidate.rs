use std::fmt;
use std::sync::Arc;

use libloading::Library;

use crate::module_system::error::{ModuleResult, ModuleSystemError};
use crate::module_system::export::namespace_of;
use crate::module_system::ffi::{FfiConstruct, FfiFreeString, FfiModule};
use crate::module_system::traits::{Module, ModuleType};
use crate::module_system::wrapper::{ModuleOrigin, simple_type_name};
use crate::utils::guarded;

/// Parameterless constructor for a statically linked module type
pub type StaticConstructor = fn() -> ModuleResult<Box<dyn Module>>;

#[derive(Clone)]
pub(crate) enum Constructor {
    Static(StaticConstructor),
    Native {
        construct: FfiConstruct,
        free_string: FfiFreeString,
        library: Arc<Library>,
    },
}

/// A type found in a loaded binary that may become a module.
#[derive(Clone)]
pub struct ModuleCandidate {
    pub type_name: String,
    pub namespace: String,
    pub category: String,
    pub marked: bool,
    pub binary: String,
    constructor: Option<Constructor>,
}

fn construct_boxed<T: ModuleType>() -> ModuleResult<Box<dyn Module>> {
    T::construct().map(|m| Box::new(m) as Box<dyn Module>)
}

impl ModuleCandidate {
    /// Candidate for a statically linked type
    pub fn of<T: ModuleType>() -> Self {
        Self {
            type_name: std::any::type_name::<T>().to_string(),
            namespace: namespace_of::<T>(),
            category: T::CATEGORY.to_string(),
            marked: T::MARKED,
            binary: String::new(),
            constructor: Some(Constructor::Static(construct_boxed::<T>)),
        }
    }

    /// Candidate with an explicit constructor (or none, for types that cannot
    /// be built without arguments)
    pub fn new(
        type_name: impl Into<String>,
        namespace: impl Into<String>,
        category: impl Into<String>,
        marked: bool,
        constructor: Option<StaticConstructor>,
    ) -> Self {
        Self {
            type_name: type_name.into(),
            namespace: namespace.into(),
            category: category.into(),
            marked,
            binary: String::new(),
            constructor: constructor.map(Constructor::Static),
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub(crate) fn native(
        type_name: String,
        namespace: String,
        category: String,
        marked: bool,
        binary: String,
        construct: Option<FfiConstruct>,
        free_string: FfiFreeString,
        library: Arc<Library>,
    ) -> Self {
        Self {
            type_name,
            namespace,
            category,
            marked,
            binary,
            constructor: construct.map(|construct| Constructor::Native {
                construct,
                free_string,
                library,
            }),
        }
    }

    pub fn with_binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }

    pub fn simple_type_name(&self) -> &str {
        simple_type_name(&self.type_name)
    }

    pub fn is_constructible(&self) -> bool {
        self.constructor.is_some()
    }

    /// Discovery filter: constructible, and either marked or (when
    /// `require_marker` is set) living under `namespace_prefix`.
    pub fn is_eligible(&self, require_marker: bool, namespace_prefix: &str) -> bool {
        self.is_constructible()
            && (self.marked || !require_marker || self.namespace.starts_with(namespace_prefix))
    }

    pub(crate) fn origin(&self) -> ModuleOrigin {
        ModuleOrigin {
            type_name: self.type_name.clone(),
            category: self.category.clone(),
            binary: self.binary.clone(),
        }
    }

    /// Runs the constructor. Errors and panics become `InstantiationError`.
    pub(crate) fn instantiate(&self) -> Result<Box<dyn Module>, ModuleSystemError> {
        let instantiation_error = |message: String| ModuleSystemError::InstantiationError {
            type_name: self.type_name.clone(),
            message,
        };
        match &self.constructor {
            None => Err(instantiation_error("no parameterless constructor".to_string())),
            Some(Constructor::Static(ctor)) => match guarded(ctor) {
                Ok(Ok(module)) => Ok(module),
                Ok(Err(e)) => Err(instantiation_error(e.to_string())),
                Err(panic_msg) => Err(instantiation_error(format!("panic: {}", panic_msg))),
            },
            Some(Constructor::Native { construct, free_string, library }) => {
                let module = unsafe { FfiModule::construct(*construct, *free_string, &self.type_name, Arc::clone(library)) }?;
                Ok(Box::new(module))
            }
        }
    }
}

impl fmt::Debug for ModuleCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleCandidate")
            .field("type_name", &self.type_name)
            .field("namespace", &self.namespace)
            .field("category", &self.category)
            .field("marked", &self.marked)
            .field("binary", &self.binary)
            .field("constructible", &self.is_constructible())
            .finish()
    }
}

/// Moves candidates named in `priority` to the front, in list order.
/// Matching is by exact simple or full type name; only the first match per
/// entry moves. Everything else keeps its discovery order.
pub fn apply_boot_priority(candidates: Vec<ModuleCandidate>, priority: &[String]) -> Vec<ModuleCandidate> {
    let mut rest = candidates;
    let mut front = Vec::with_capacity(priority.len());
    for wanted in priority {
        if let Some(pos) = rest
            .iter()
            .position(|c| c.simple_type_name() == wanted.as_str() || c.type_name == *wanted)
        {
            front.push(rest.remove(pos));
        }
    }
    front.extend(rest);
    front
}
