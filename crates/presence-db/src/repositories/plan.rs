//! Normalised form of an edge aggregation pipeline

use presence_core::{EdgeField, EdgeFilter, Pipeline, RepoResult, Stage};

use super::error::unsupported_pipeline;

/// Match stages first, then an optional row limit, one optional grouping, and a
/// limit on the grouped rows.
#[derive(Debug, Default)]
pub(crate) struct AggregatePlan {
    pub filters: Vec<EdgeFilter>,
    pub row_limit: Option<usize>,
    pub group_by: Option<EdgeField>,
    pub group_limit: Option<usize>,
}

impl AggregatePlan {
    pub fn from_pipeline(pipeline: Pipeline<EdgeFilter, EdgeField>) -> RepoResult<Self> {
        let mut plan = Self::default();

        for stage in pipeline.into_stages() {
            match stage {
                Stage::Match(filter) => {
                    if plan.group_by.is_some() || plan.row_limit.is_some() {
                        return Err(unsupported_pipeline("match after limit or group"));
                    }
                    plan.filters.push(filter);
                }
                Stage::GroupBy(field) => {
                    if plan.group_by.replace(field).is_some() {
                        return Err(unsupported_pipeline("more than one group stage"));
                    }
                }
                Stage::Limit(n) => {
                    let slot = if plan.group_by.is_some() {
                        &mut plan.group_limit
                    } else {
                        &mut plan.row_limit
                    };
                    *slot = Some(slot.map_or(n, |current| current.min(n)));
                }
            }
        }

        Ok(plan)
    }
}
