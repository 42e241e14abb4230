//! Deterministic, interned resolved-type representation for Opal, plus the
//! assembly declaration database the checker queries.
//!
//! [`TypeStore`] interns canonicalized [`TypeKind`] values into stable
//! [`TypeId`]s: unions are flattened, deduped, and sorted, and record
//! property order is canonicalized, so structurally equal types always
//! receive the same id. [`Assembly`] layers the nominal world on top: entity
//! and concept declarations, namespaces, the provides-based subtype
//! relation, member lookup with unique-root detection, and the narrowing
//! operators flow analysis uses.

mod decls;
mod display;
mod ids;
mod kind;
mod options;
mod relate;
mod store;

pub use decls::Assembly;
pub use decls::MemberKind;
pub use decls::MemberLookup;
pub use decls::MemberRef;
pub use decls::Namespace;
pub use decls::SpecialTypes;
pub use decls::TermMap;
pub use decls::TypeError;
pub use decls::CORE_NS;
pub use display::TypeDisplay;
pub use ids::DeclId;
pub use ids::NameId;
pub use ids::TypeId;
pub use kind::is_universal_method_name;
pub use kind::params_well_ordered;
pub use kind::ConceptType;
pub use kind::EntityRef;
pub use kind::FunctionParam;
pub use kind::FunctionType;
pub use kind::RecordProp;
pub use kind::RecordType;
pub use kind::TupleEntry;
pub use kind::TupleType;
pub use kind::TypeKind;
pub use kind::UNIVERSAL_METHODS;
pub use options::TypeOptions;
pub use store::TypeStore;
