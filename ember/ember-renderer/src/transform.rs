//! Fixed-capacity matrix stack for the model transform.

use crate::math::Matrix;

#[derive(Clone, Debug)]
pub struct MatrixStack {
    entries: Vec<Matrix>,
    depth: usize,
}

impl MatrixStack {
    pub fn new(capacity: usize) -> Self {
        Self { entries: vec![Matrix::IDENTITY; capacity.max(1)], depth: 0 }
    }

    pub fn top(&self) -> &Matrix {
        &self.entries[self.depth]
    }

    pub fn top_mut(&mut self) -> &mut Matrix {
        &mut self.entries[self.depth]
    }

    /// Duplicates the top. No-op at capacity.
    pub fn push(&mut self) {
        if self.depth + 1 >= self.entries.len() {
            return;
        }
        self.entries[self.depth + 1] = self.entries[self.depth];
        self.depth += 1;
    }

    /// Discards the top. No-op at depth 0.
    pub fn pop(&mut self) {
        if self.depth > 0 {
            self.depth -= 1;
        }
    }

    /// Back to the bottom entry; the bottom entry keeps its value.
    pub fn reset(&mut self) {
        self.depth = 0;
    }

    pub fn depth(&self) -> usize { self.depth }
    pub fn capacity(&self) -> usize { self.entries.len() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::{multiply, rotation, translation};

    #[test]
    fn balanced_push_pop_restores_top() {
        let mut stack = MatrixStack::new(8);
        *stack.top_mut() = rotation(10.0, 20.0, 30.0);
        let before = *stack.top();
        for i in 0..5 {
            stack.push();
            let t = translation(i as f32, 1.0, 2.0);
            *stack.top_mut() = multiply(&t, stack.top());
        }
        for _ in 0..5 {
            stack.pop();
        }
        assert_eq!(stack.top().m, before.m);
        assert_eq!(stack.depth(), 0);
    }

    #[test]
    fn push_at_capacity_and_pop_at_zero_are_noops() {
        let mut stack = MatrixStack::new(3);
        stack.pop();
        assert_eq!(stack.depth(), 0);
        for _ in 0..10 {
            stack.push();
        }
        assert_eq!(stack.depth(), 2);
        *stack.top_mut() = translation(9.0, 9.0, 9.0);
        stack.push();
        assert_eq!(stack.depth(), 2);
        assert_eq!(*stack.top(), translation(9.0, 9.0, 9.0));
    }
}
