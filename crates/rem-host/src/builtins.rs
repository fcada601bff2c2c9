//! Builtin host callables
//!
//! Small callables an embedder can install in the environment. They run
//! synchronously inside a register-mode call instruction and manipulate
//! the machine through its public accessors.

use std::cell::RefCell;
use std::rc::Rc;

use tracing::debug;

use rem_core::{Callable, RemResult, VirtualMachine};

/// Where builtin output is written
#[derive(Clone)]
pub enum OutputSink {
    Stdout,
    Capture(Rc<RefCell<Vec<String>>>),
}

/// Pops a string pointer off the operand stack and writes the decoded
/// NUL-terminated text it addresses.
pub struct Println {
    sink: OutputSink,
}

impl Println {
    pub fn stdout() -> Rc<Self> {
        Rc::new(Println {
            sink: OutputSink::Stdout,
        })
    }

    /// A println that records its lines for inspection
    pub fn capture() -> (Rc<Self>, Rc<RefCell<Vec<String>>>) {
        let buffer = Rc::new(RefCell::new(Vec::new()));
        let println = Rc::new(Println {
            sink: OutputSink::Capture(Rc::clone(&buffer)),
        });
        (println, buffer)
    }
}

impl Callable for Println {
    fn invoke(&self, vm: &mut VirtualMachine) -> RemResult<()> {
        let pointer = vm.stack_pop()?;
        let text = vm.read_string(&pointer, usize::MAX)?;

        debug!("println: {}", text);
        match &self.sink {
            OutputSink::Stdout => println!("{}", text),
            OutputSink::Capture(buffer) => buffer.borrow_mut().push(text),
        }
        Ok(())
    }
}
