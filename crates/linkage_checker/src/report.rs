use crate::problem::LinkageProblem;
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

/// Problems found by one linkage check, in the order the references were resolved.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkageCheckReport {
    problems: IndexSet<LinkageProblem>,
}

impl LinkageCheckReport {
    pub fn new(problems: IndexSet<LinkageProblem>) -> Self {
        Self { problems }
    }

    pub fn problems(&self) -> &IndexSet<LinkageProblem> {
        &self.problems
    }

    pub fn into_problems(self) -> IndexSet<LinkageProblem> {
        self.problems
    }

    /// Problems whose source class is reachable from the entry points. Without entry points
    /// every problem counts as reachable.
    pub fn reachable_problems(&self) -> impl Iterator<Item = &LinkageProblem> {
        self.problems.iter().filter(|problem| problem.is_reachable())
    }

    pub fn len(&self) -> usize {
        self.problems.len()
    }

    pub fn is_empty(&self) -> bool {
        self.problems.is_empty()
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

impl FromIterator<LinkageProblem> for LinkageCheckReport {
    fn from_iter<T: IntoIterator<Item = LinkageProblem>>(iter: T) -> Self {
        Self::new(iter.into_iter().collect())
    }
}
