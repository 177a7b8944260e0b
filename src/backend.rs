//! The abstract operation surface a backend supplies.
//!
//! The original runtime wired this up as a per-object table of function
//! pointers keyed by operation-name strings. Here each backend implements
//! the [`Backend`] trait instead: mandatory operations are required methods,
//! optional ones carry default bodies that report
//! [`ErrorCode::Unsupported`](crate::error::ErrorCode::Unsupported), so a
//! "lookup miss" is a typed, distinguishable outcome rather than a null
//! pointer.
//!
//! [`Operation`] is the stable backend-independent vocabulary external
//! backend implementations must honor; it is the crate's extensibility
//! surface.

use core::fmt;
use std::sync::Arc;

use crate::basis::Basis;
use crate::error::{Error, Result};
use crate::operator::{CompositeOperator, Operator};
use crate::qfunction::{QFunction, QFunctionFn};
use crate::restriction::ElemRestriction;
use crate::vector::Vector;

/// Preferred residency of a backend's working data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MemType {
    /// Host memory.
    #[default]
    Host,
    /// Device memory.
    Device,
}

impl fmt::Display for MemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemType::Host => f.write_str("host"),
            MemType::Device => f.write_str("device"),
        }
    }
}

/// The stable operation-name vocabulary.
///
/// `GetPreferredMemType`, `VectorCreate`, and `Destroy` are mandatory;
/// everything else is optional and its absence is a capability signal, not
/// an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    GetPreferredMemType,
    VectorCreate,
    BasisCreateTensor,
    ElemRestrictionCreate,
    QFunctionCreate,
    OperatorCreate,
    CompositeOperatorCreate,
    Destroy,
}

impl Operation {
    /// Whether every backend must implement this operation.
    pub fn is_mandatory(self) -> bool {
        matches!(
            self,
            Operation::GetPreferredMemType | Operation::VectorCreate | Operation::Destroy
        )
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::GetPreferredMemType => "GetPreferredMemType",
            Operation::VectorCreate => "VectorCreate",
            Operation::BasisCreateTensor => "BasisCreateTensor",
            Operation::ElemRestrictionCreate => "ElemRestrictionCreate",
            Operation::QFunctionCreate => "QFunctionCreate",
            Operation::OperatorCreate => "OperatorCreate",
            Operation::CompositeOperatorCreate => "CompositeOperatorCreate",
            Operation::Destroy => "Destroy",
        };
        f.write_str(name)
    }
}

/// A concrete execution backend.
///
/// Implementations own whatever device state they need (the former opaque
/// context pointer) as ordinary struct fields. The engine handle calls
/// `destroy` exactly once before the backend is dropped.
pub trait Backend: Send + Sync {
    /// Human-readable backend name, e.g. `"cpu-ref"`.
    fn name(&self) -> &str;

    /// Residency this backend prefers for vectors it creates.
    fn preferred_mem_type(&self) -> MemType;

    /// Creates a logical vector of `len` elements. No buffer is allocated
    /// until the vector is first written or leased.
    fn vector_create(&self, len: usize) -> Result<Vector>;

    /// Releases backend-held resources. Called exactly once by the engine.
    fn destroy(&mut self) -> Result<()>;

    /// Whether `operation` is available without invoking it.
    fn supports(&self, operation: Operation) -> bool {
        operation.is_mandatory()
    }

    /// Creates a tensor-product basis object. Optional.
    fn basis_create_tensor(
        &self,
        dim: usize,
        p1d: usize,
        q1d: usize,
        interp1d: Vec<crate::Scalar>,
        grad1d: Vec<crate::Scalar>,
        qweight1d: Vec<crate::Scalar>,
    ) -> Result<Basis> {
        let _ = (dim, p1d, q1d, interp1d, grad1d, qweight1d);
        Err(Error::unsupported(Operation::BasisCreateTensor))
    }

    /// Creates an element-restriction index map. Optional.
    fn elem_restriction_create(
        &self,
        num_elem: usize,
        elem_size: usize,
        lsize: usize,
        indices: Vec<usize>,
    ) -> Result<ElemRestriction> {
        let _ = (num_elem, elem_size, lsize, indices);
        Err(Error::unsupported(Operation::ElemRestrictionCreate))
    }

    /// Creates a pointwise-kernel object from a user function. Optional.
    fn qfunction_create(
        &self,
        name: &str,
        num_inputs: usize,
        num_outputs: usize,
        user_fn: QFunctionFn,
    ) -> Result<QFunction> {
        let _ = (name, num_inputs, num_outputs, user_fn);
        Err(Error::unsupported(Operation::QFunctionCreate))
    }

    /// Creates an operator applying `qf` over `restr`. Optional.
    fn operator_create(
        &self,
        qf: Arc<QFunction>,
        restr: Option<Arc<ElemRestriction>>,
    ) -> Result<Operator> {
        let _ = (qf, restr);
        Err(Error::unsupported(Operation::OperatorCreate))
    }

    /// Creates a backend-specialized composite operator. Optional; when
    /// absent the engine builds the generic summing composite instead.
    fn composite_operator_create(&self, sub: Vec<Operator>) -> Result<CompositeOperator> {
        let _ = sub;
        Err(Error::unsupported(Operation::CompositeOperatorCreate))
    }
}

/// Backend construction function stored in the registry.
pub type BackendInit = fn(&crate::registry::Resource) -> Result<Box<dyn Backend>>;
