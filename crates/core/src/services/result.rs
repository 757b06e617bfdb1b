//! Result envelope assembly.

use crate::models::{PageMeta, Pagination, ResultMeta, ResultOptions, ResultSet, Sorting};

/// Build the `{results, meta?}` envelope for a query type.
///
/// `results` are kept verbatim. Pagination echoes `limit` and `offset`, or
/// `limit` and the caller's opaque cursors. Sorting echoes the query's
/// `sortBy`. `meta` is `None` when neither is configured.
pub fn assemble_result<T>(
    pagination: Option<&Pagination>,
    sorting: Option<&Sorting>,
    options: ResultOptions<T>,
) -> ResultSet<T> {
    let ResultOptions {
        results,
        query,
        next_page_cursor,
        previous_page_cursor,
    } = options;

    if pagination.is_none() && sorting.is_none() {
        return ResultSet { results, meta: None };
    }

    let page = pagination.map(|pagination| match pagination {
        Pagination::ByOffset(limits) => PageMeta::Offset {
            limit: query.limit().unwrap_or(limits.default_limit),
            offset: query.offset().unwrap_or(0),
        },
        Pagination::ByCursor(limits) => PageMeta::Cursor {
            limit: query.limit().unwrap_or(limits.default_limit),
            next_page: next_page_cursor,
            previous_page: previous_page_cursor,
        },
    });

    let sort_by = sorting.and(query.sort_by);

    ResultSet {
        results,
        meta: Some(ResultMeta {
            page,
            sort_by,
            ..Default::default()
        }),
    }
}
