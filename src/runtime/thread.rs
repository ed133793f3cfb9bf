//! Thread state: the frame stack the collectors fall back to when no
//! constraint variable resolves to a live reference.

use super::heap::Value;

/// One stack frame of the analysed thread.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub class_name: String,
    pub method_name: String,
    pub signature: String,
    /// Local slots, receiver first for instance methods.
    pub locals: Vec<Value>,
}

impl Frame {
    pub fn new(
        class_name: impl Into<String>,
        method_name: impl Into<String>,
        signature: impl Into<String>,
    ) -> Self {
        Frame {
            class_name: class_name.into(),
            method_name: method_name.into(),
            signature: signature.into(),
            locals: Vec::new(),
        }
    }

    pub fn with_locals(mut self, locals: Vec<Value>) -> Self {
        self.locals = locals;
        self
    }

    /// Fully qualified method name, e.g. `com.foo.List.insert(I)V`.
    pub fn qualified_method(&self) -> String {
        format!("{}.{}{}", self.class_name, self.method_name, self.signature)
    }
}

/// The analysed thread. The driver is single-threaded, so one of these
/// exists per analysis session.
#[derive(Debug, Default)]
pub struct ThreadState {
    pub frames: Vec<Frame>,
}

impl ThreadState {
    pub fn new() -> Self {
        ThreadState::default()
    }

    pub fn push_frame(&mut self, frame: Frame) {
        self.frames.push(frame);
    }

    pub fn pop_frame(&mut self) -> Option<Frame> {
        self.frames.pop()
    }

    pub fn top_frame(&self) -> Option<&Frame> {
        self.frames.last()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::heap::{ObjectId, Value};

    #[test]
    fn test_frame_stack_and_qualified_name() {
        let mut thread = ThreadState::new();
        assert!(thread.top_frame().is_none());

        thread.push_frame(
            Frame::new("com.foo.List", "insert", "(I)V")
                .with_locals(vec![Value::Ref(ObjectId(7)), Value::Long(3)]),
        );
        let top = thread.top_frame().unwrap();
        assert_eq!(top.qualified_method(), "com.foo.List.insert(I)V");
        assert_eq!(top.locals.len(), 2);
    }
}
