mod builder;
mod order;

use super::*;
use std::collections::{BTreeMap, BTreeSet};

pub use builder::{GraphBuilder, SyncedFunction};
pub use order::order_functions;

/// Functions of one pass with the dependency rows they own.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FunctionGraph {
    /// function output -> attributes it reads
    pub dependencies: BTreeMap<AttributeRef, Vec<AttributeRef>>,
    pub rows: Vec<DependencyEdge>,
}

impl FunctionGraph {
    pub fn new<I>(functions: I, rows: Vec<DependencyEdge>) -> Self
    where
        I: IntoIterator<Item = AttributeRef>,
    {
        let mut dependencies: BTreeMap<_, Vec<_>> = functions
            .into_iter()
            .map(|function| (function, vec![]))
            .collect();
        for row in &rows {
            dependencies
                .entry(row.function.clone())
                .or_default()
                .push(row.dependency.clone());
        }
        Self { dependencies, rows }
    }

    pub fn order(&self) -> Vec<AttributeRef> {
        order_functions(&self.dependencies)
    }

    pub fn contains(&self, function: &AttributeRef) -> bool {
        self.dependencies.contains_key(function)
    }

    pub fn len(&self) -> usize {
        self.dependencies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dependencies.is_empty()
    }

    /// rows of functions reading `attribute`
    pub fn readers<'a>(
        &'a self,
        attribute: &'a AttributeRef,
    ) -> impl Iterator<Item = &'a DependencyEdge> {
        self.rows.iter().filter(move |row| &row.dependency == attribute)
    }

    pub fn rows_of<'a>(
        &'a self,
        function: &'a AttributeRef,
    ) -> impl Iterator<Item = &'a DependencyEdge> {
        self.rows.iter().filter(move |row| &row.function == function)
    }
}
