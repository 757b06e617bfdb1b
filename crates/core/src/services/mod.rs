pub mod compiler;
mod descriptor;
mod result;

pub use compiler::{CompiledQuery, pagination_schema, query_schema, sortable_field_schema, sorting_schema};
pub use descriptor::{QueryConfig, QueryDescriptor};
pub use result::assemble_result;
