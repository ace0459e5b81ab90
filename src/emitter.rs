//! Textual code emission for the stack-based virtual machine.
//!
//! The emitter knows nothing about parsing or type checking — it is a thin
//! wrapper over a `String` buffer plus the one piece of emission state that
//! truly is global: the fresh-label counter. Everything else (frame size,
//! current level) is threaded through by the caller.

use std::fmt::Write as _;

/// Reserved labels. `L.0` names the BSS region, `L.1` the runtime stack
/// region, `L.2` the program entry jump.
pub const BSS_LABEL: &str = "L.0";
pub const STACK_LABEL: &str = "L.1";
pub const ENTRY_LABEL: &str = "L.2";

/// Size (in slots) of the fixed runtime stack region reserved past the
/// program's own BSS.
pub const STACK_SIZE: i64 = 500;

pub struct Emitter {
    code: String,
    next_label: u32,
}

impl Emitter {
    pub fn new() -> Self {
        Emitter {
            code: String::new(),
            next_label: crate::symbol::FIRST_USER_LABEL + 1,
        }
    }

    /// Allocate a fresh, never-reused label of the form `L.n`.
    pub fn new_label(&mut self) -> String {
        let label = format!("L.{}", self.next_label);
        self.next_label += 1;
        label
    }

    pub fn into_code(self) -> String {
        self.code
    }

    fn line(&mut self, text: &str) {
        writeln!(self.code, "  {}", text).expect("writing to a String cannot fail");
    }

    fn label_def(&mut self, label: &str) {
        writeln!(self.code, "{}:", label).expect("writing to a String cannot fail");
    }

    pub fn emit_init(&mut self, program_label: &str) {
        self.line(&format!(
            "init {}, {}, {}, {}, {}",
            BSS_LABEL,
            crate::symbol::FRAME_PROLOGUE,
            STACK_LABEL,
            ENTRY_LABEL,
            program_label
        ));
    }

    pub fn emit_bss_label(&mut self) {
        self.label_def(BSS_LABEL);
    }

    pub fn emit_bss(&mut self, count: i64) {
        self.line(&format!("bss {}", count));
    }

    pub fn emit_entry_label(&mut self) {
        self.label_def(ENTRY_LABEL);
    }

    pub fn emit_label(&mut self, label: &str) {
        self.label_def(label);
    }

    pub fn emit_save(&mut self, level: u32) {
        self.line(&format!("save {}, 0", level));
    }

    pub fn emit_asp(&mut self, delta: i64) {
        self.line(&format!("asp {}", delta));
    }

    pub fn emit_la(&mut self, offset: i64, level: u32) {
        self.line(&format!("la {}, {}", offset, level));
    }

    pub fn emit_lc(&mut self, value: i64) {
        self.line(&format!("lc {}", value));
    }

    pub fn emit_st(&mut self) {
        self.line("st");
    }

    pub fn emit_deref(&mut self) {
        self.line("deref");
    }

    pub fn emit_iread(&mut self) {
        self.line("iread");
    }

    pub fn emit_cread(&mut self) {
        self.line("cread");
    }

    pub fn emit_iwrite(&mut self) {
        self.line("iwrite");
    }

    pub fn emit_cwrite(&mut self) {
        self.line("cwrite");
    }

    pub fn emit_add(&mut self) {
        self.line("add");
    }

    pub fn emit_sub(&mut self) {
        self.line("sub");
    }

    pub fn emit_mul(&mut self) {
        self.line("mul");
    }

    pub fn emit_div(&mut self) {
        self.line("div");
    }

    pub fn emit_and(&mut self) {
        self.line("and");
    }

    pub fn emit_or(&mut self) {
        self.line("or");
    }

    pub fn emit_not(&mut self) {
        self.line("not");
    }

    pub fn emit_neg(&mut self) {
        self.line("neg");
    }

    pub fn emit_lt(&mut self) {
        self.line(".lt.");
    }

    pub fn emit_le(&mut self) {
        self.line(".le.");
    }

    pub fn emit_ne(&mut self) {
        self.line(".ne.");
    }

    pub fn emit_eq(&mut self) {
        self.line(".eq.");
    }

    pub fn emit_gt(&mut self) {
        self.line(".gt.");
    }

    pub fn emit_ge(&mut self) {
        self.line(".ge.");
    }

    pub fn emit_jf(&mut self, label: &str) {
        self.line(&format!("jf {}", label));
    }

    pub fn emit_jp(&mut self, label: &str) {
        self.line(&format!("jp {}", label));
    }

    pub fn emit_js(&mut self, label: &str) {
        self.line(&format!("js {}", label));
    }

    pub fn emit_ji(&mut self) {
        self.line("ji");
    }

    pub fn emit_push(&mut self, level: u32) {
        self.line(&format!("push {}, 0", level));
    }

    pub fn emit_pop(&mut self, level: u32) {
        self.line(&format!("pop {}, 0", level));
    }

    pub fn emit_halt(&mut self) {
        self.line("halt");
    }

    pub fn emit_stack_bss(&mut self) {
        self.label_def(STACK_LABEL);
        self.line(&format!("bss {}", STACK_SIZE));
    }

    pub fn emit_end(&mut self) {
        self.line("end");
    }
}

impl Default for Emitter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_start_after_reserved_range() {
        let mut emitter = Emitter::new();
        assert_eq!(emitter.new_label(), "L.4");
        assert_eq!(emitter.new_label(), "L.5");
    }

    #[test]
    fn minimal_program_shape() {
        let mut e = Emitter::new();
        e.emit_init("L.3");
        e.emit_bss_label();
        e.emit_bss(20);
        e.emit_entry_label();
        e.emit_label("L.3");
        e.emit_halt();
        e.emit_stack_bss();
        e.emit_end();
        let code = e.into_code();
        assert_eq!(
            code,
            "  init L.0, 20, L.1, L.2, L.3\n\
             L.0:\n\
             \x20\x20bss 20\n\
             L.2:\n\
             L.3:\n\
             \x20\x20halt\n\
             L.1:\n\
             \x20\x20bss 500\n\
             \x20\x20end\n"
        );
    }

    #[test]
    fn assignment_instruction_order() {
        let mut e = Emitter::new();
        e.emit_la(20, 0);
        e.emit_lc(1);
        e.emit_lc(2);
        e.emit_add();
        e.emit_st();
        assert_eq!(
            e.into_code(),
            "  la 20, 0\n  lc 1\n  lc 2\n  add\n  st\n"
        );
    }
}
