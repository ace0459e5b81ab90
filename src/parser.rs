//! Recursive-descent parser, type checker, and emitter.
//!
//! There is no intermediate AST: each grammar production consumes its
//! matching token prefix, checks the types it needs, and streams VM
//! instructions as it goes, all in a single pass. A nonterminal that
//! produces a value (most expression rules) returns the `Type` of that
//! value so its caller can check it without re-deriving it.

use crate::diagnostics::{Diagnostic, LexError};
use crate::emitter::Emitter;
use crate::scanner::Scanner;
use crate::symbol::{ScopeStack, SymbolEntry, FRAME_PROLOGUE};
use crate::token::{Token, TokenKind};
use crate::types::Type;

/// A declaration's shape, as produced by N_TYPE, before it is turned into
/// the SymbolEntry variant that matches it.
enum DeclType {
    Simple(Type),
    Array { left: i64, right: i64, base: Type },
}

/// The live state of a currently-open PROGRAM/PROCEDURE activation while
/// its block is being parsed: frame size accumulates here as local
/// declarations are seen, tracked independently of name lookup so it can
/// never be confused with a same-named local shadowing the procedure
/// itself.
struct Frame {
    label: String,
    level: u32,
    frame_size: i64,
    is_procedure: bool,
}

#[derive(Clone, Copy, PartialEq)]
enum Sign {
    Plus,
    Minus,
}

#[derive(Clone, Copy)]
enum RelOp {
    Lt,
    Le,
    Ne,
    Eq,
    Gt,
    Ge,
}

#[derive(Clone, Copy)]
enum AddOp {
    Plus,
    Minus,
    Or,
}

#[derive(Clone, Copy)]
enum MulOp {
    Mult,
    Div,
    And,
}

/// The two output streams plus any non-fatal lexical diagnostics collected
/// along the way.
pub struct ParseOutput {
    pub trace: String,
    pub code: String,
    pub warnings: Vec<LexError>,
}

pub struct Parser {
    token: Option<Token>,
    line: usize,
    scanner: Scanner,
    scopes: ScopeStack,
    frames: Vec<Frame>,
    emitter: Emitter,
    trace: String,
    lex_errors: Vec<LexError>,
    debug: bool,
    suppress: bool,
}

impl Parser {
    pub fn new(source: &str, debug: bool, suppress: bool) -> Self {
        let mut parser = Parser {
            token: None,
            line: 1,
            scanner: Scanner::new(source),
            scopes: ScopeStack::new(),
            frames: Vec::new(),
            emitter: Emitter::new(),
            trace: String::new(),
            lex_errors: Vec::new(),
            debug,
            suppress,
        };
        parser.advance();
        parser
    }

    pub fn parse(mut self) -> Result<ParseOutput, Diagnostic> {
        self.n_prog()?;
        Ok(ParseOutput {
            trace: self.trace,
            code: self.emitter.into_code(),
            warnings: self.lex_errors,
        })
    }

    // ---- token stream plumbing -------------------------------------

    fn advance(&mut self) {
        loop {
            match self.scanner.next() {
                Some(Ok(tok)) => {
                    self.line = tok.line;
                    if !self.suppress {
                        self.trace_token(&tok);
                    }
                    self.token = Some(tok);
                    return;
                }
                Some(Err(e)) => {
                    tracing::debug!(error = %e, "dropping malformed lexeme");
                    self.lex_errors.push(e);
                }
                None => {
                    self.token = None;
                    return;
                }
            }
        }
    }

    fn trace_token(&mut self, tok: &Token) {
        use std::fmt::Write;
        let _ = writeln!(
            self.trace,
            "TOKEN: {:<12}LEXEME: {}",
            tok.kind.name(),
            tok.lexeme
        );
    }

    fn rule(&mut self, lhs: &str, rhs: &str) {
        if self.debug && !self.suppress {
            use std::fmt::Write;
            let _ = writeln!(self.trace, "{} -> {}", lhs, rhs);
        }
    }

    fn kind(&self) -> Option<TokenKind> {
        self.token.as_ref().map(|t| t.kind)
    }

    fn lexeme(&self) -> String {
        self.token.as_ref().map(|t| t.lexeme.clone()).unwrap_or_default()
    }

    fn syntax_error(&self) -> Diagnostic {
        Diagnostic::Syntax(self.line)
    }

    fn expect(&mut self, kind: TokenKind) -> Result<(), Diagnostic> {
        if self.kind() == Some(kind) {
            self.advance();
            Ok(())
        } else {
            Err(self.syntax_error())
        }
    }

    // ---- scope / frame plumbing -------------------------------------

    fn open_scope(&mut self) {
        tracing::debug!(depth = self.scopes.depth() + 1, "opening scope");
        self.scopes.open_scope();
    }

    fn close_scope(&mut self) {
        tracing::debug!(depth = self.scopes.depth(), "closing scope");
        self.scopes.close_scope();
    }

    fn declare(&mut self, name: &str, entry: SymbolEntry) -> Result<(), Diagnostic> {
        self.scopes
            .declare(name, entry)
            .map_err(|_| Diagnostic::MultiplyDefined(self.line))
    }

    fn search_id(&self, name: &str) -> Result<SymbolEntry, Diagnostic> {
        self.scopes
            .lookup(name)
            .cloned()
            .ok_or(Diagnostic::Undefined(self.line))
    }

    fn current_level(&self) -> u32 {
        self.frames.last().map(|f| f.level).unwrap_or(0)
    }

    fn alloc_slots(&mut self, count: i64) -> i64 {
        let frame = self.frames.last_mut().expect("declaring with no open frame");
        let offset = frame.frame_size;
        frame.frame_size += count;
        offset
    }

    // ---- grammar ------------------------------------------------------

    fn n_prog(&mut self) -> Result<(), Diagnostic> {
        self.rule("N_PROG", "N_PROGLBL T_IDENT T_SCOLON N_BLOCK T_DOT");
        self.n_prog_lbl()?;

        self.open_scope();

        if self.kind() != Some(TokenKind::Ident) {
            return Err(self.syntax_error());
        }
        let name = self.lexeme();
        let label = "L.3".to_string();
        self.declare(
            &name,
            SymbolEntry::Program {
                label: label.clone(),
                level: 0,
            },
        )?;
        self.frames.push(Frame {
            label,
            level: 0,
            frame_size: FRAME_PROLOGUE,
            is_procedure: false,
        });
        self.advance();

        self.expect(TokenKind::SColon)?;
        self.n_block()?;
        self.expect(TokenKind::Dot)?;

        if self.token.is_some() {
            return Err(self.syntax_error());
        }
        Ok(())
    }

    fn n_prog_lbl(&mut self) -> Result<(), Diagnostic> {
        self.rule("N_PROGLBL", "T_PROG");
        self.expect(TokenKind::Program)
    }

    fn n_block(&mut self) -> Result<(), Diagnostic> {
        self.rule("N_BLOCK", "N_VARDECPART N_PROCDECPART N_STMTPART");

        self.n_var_dec_part()?;

        if self.frames.len() == 1 {
            let program_label = self.frames[0].label.clone();
            let frame_size = self.frames[0].frame_size;
            self.emitter.emit_init(&program_label);
            self.emitter.emit_bss_label();
            self.emitter.emit_bss(frame_size);
            self.emitter.emit_entry_label();
        }

        self.n_proc_dec_part()?;
        self.n_stmt_part()?;

        self.close_scope();
        Ok(())
    }

    fn n_var_dec_part(&mut self) -> Result<(), Diagnostic> {
        if self.kind() == Some(TokenKind::Var) {
            self.rule("N_VARDECPART", "T_VAR N_VARDEC T_SCOLON N_VARDECLST");
            self.advance();
            self.n_var_dec()?;
            self.expect(TokenKind::SColon)?;
            self.n_var_dec_lst()?;
        } else {
            self.rule("N_VARDECPART", "epsilon");
        }
        Ok(())
    }

    fn n_var_dec_lst(&mut self) -> Result<(), Diagnostic> {
        if self.kind() == Some(TokenKind::Ident) {
            self.rule("N_VARDECLST", "N_VARDEC T_SCOLON N_VARDECLST");
            self.n_var_dec()?;
            self.expect(TokenKind::SColon)?;
            self.n_var_dec_lst()?;
        } else {
            self.rule("N_VARDECLST", "epsilon");
        }
        Ok(())
    }

    fn n_var_dec(&mut self) -> Result<(), Diagnostic> {
        self.rule("N_VARDEC", "N_IDENT N_IDENTLST T_COLON N_TYPE");

        let mut idents = vec![self.n_ident()?];
        self.n_ident_lst(&mut idents)?;

        self.expect(TokenKind::Colon)?;
        let decl = self.n_type()?;
        let level = self.current_level();

        for name in idents {
            let entry = match &decl {
                DeclType::Simple(var_type) => {
                    let offset = self.alloc_slots(1);
                    SymbolEntry::SimpleVar {
                        var_type: *var_type,
                        level,
                        offset,
                    }
                }
                DeclType::Array { left, right, base } => {
                    let offset = self.alloc_slots(right - left + 1);
                    SymbolEntry::ArrayVar {
                        base_type: *base,
                        left: *left,
                        right: *right,
                        level,
                        offset,
                    }
                }
            };
            self.declare(&name, entry)?;
        }
        Ok(())
    }

    fn n_ident(&mut self) -> Result<String, Diagnostic> {
        self.rule("N_IDENT", "T_IDENT");
        if self.kind() == Some(TokenKind::Ident) {
            let name = self.lexeme();
            self.advance();
            Ok(name)
        } else {
            Err(self.syntax_error())
        }
    }

    fn n_ident_lst(&mut self, idents: &mut Vec<String>) -> Result<(), Diagnostic> {
        if self.kind() == Some(TokenKind::Comma) {
            self.rule("N_IDENTLST", "T_COMMA N_IDENT N_IDENTLST");
            self.advance();
            idents.push(self.n_ident()?);
            self.n_ident_lst(idents)?;
        } else {
            self.rule("N_IDENTLST", "epsilon");
        }
        Ok(())
    }

    fn n_type(&mut self) -> Result<DeclType, Diagnostic> {
        match self.kind() {
            Some(TokenKind::Integer) | Some(TokenKind::Char) | Some(TokenKind::Boolean) => {
                self.rule("N_TYPE", "N_SIMPLE");
                Ok(DeclType::Simple(self.n_simple()?))
            }
            Some(TokenKind::Array) => {
                self.rule("N_TYPE", "N_ARRAY");
                let (left, right, base) = self.n_array()?;
                Ok(DeclType::Array { left, right, base })
            }
            _ => Err(self.syntax_error()),
        }
    }

    fn n_simple(&mut self) -> Result<Type, Diagnostic> {
        self.rule("N_SIMPLE", "T_INT | T_CHAR | T_BOOL");
        match self.kind() {
            Some(TokenKind::Integer) => {
                self.advance();
                Ok(Type::Integer)
            }
            Some(TokenKind::Char) => {
                self.advance();
                Ok(Type::Char)
            }
            Some(TokenKind::Boolean) => {
                self.advance();
                Ok(Type::Boolean)
            }
            _ => Err(self.syntax_error()),
        }
    }

    fn n_array(&mut self) -> Result<(i64, i64, Type), Diagnostic> {
        self.rule(
            "N_ARRAY",
            "T_ARRAY T_LBRACK N_IDXRANGE T_RBRACK T_OF N_SIMPLE",
        );
        self.expect(TokenKind::Array)?;
        self.expect(TokenKind::LBrack)?;
        let (left, right) = self.n_idx_range()?;
        self.expect(TokenKind::RBrack)?;
        self.expect(TokenKind::Of)?;
        let base = self.n_simple()?;
        Ok((left, right, base))
    }

    fn n_idx(&mut self) -> Result<i64, Diagnostic> {
        self.rule("N_IDX", "T_INTCONST");
        if self.kind() == Some(TokenKind::IntConst) {
            let value: i64 = self.lexeme().parse().map_err(|_| self.syntax_error())?;
            self.advance();
            Ok(value)
        } else {
            Err(self.syntax_error())
        }
    }

    fn n_idx_range(&mut self) -> Result<(i64, i64), Diagnostic> {
        self.rule("N_IDXRANGE", "N_IDX T_DOTDOT N_IDX");
        let left = self.n_idx()?;
        self.expect(TokenKind::DotDot)?;
        let right = self.n_idx()?;
        if left > right {
            return Err(Diagnostic::BadArrayBounds(self.line));
        }
        Ok((left, right))
    }

    fn n_proc_dec_part(&mut self) -> Result<(), Diagnostic> {
        if self.kind() == Some(TokenKind::Procedure) {
            self.rule("N_PROCDECPART", "N_PROCDEC T_SCOLON N_PROCDECPART");
            self.n_proc_dec()?;
            self.expect(TokenKind::SColon)?;
            self.n_proc_dec_part()?;
        } else {
            self.rule("N_PROCDECPART", "epsilon");
        }
        Ok(())
    }

    fn n_proc_dec(&mut self) -> Result<(), Diagnostic> {
        self.rule("N_PROCDEC", "N_PROCHDR N_BLOCK");
        self.n_proc_hdr()?;
        self.open_scope();
        self.n_block()
    }

    fn n_proc_hdr(&mut self) -> Result<(), Diagnostic> {
        self.rule("N_PROCHDR", "T_PROC T_IDENT T_SCOLON");
        self.expect(TokenKind::Procedure)?;

        if self.kind() != Some(TokenKind::Ident) {
            return Err(self.syntax_error());
        }
        let name = self.lexeme();
        let label = self.emitter.new_label();
        let level = self.current_level() + 1;
        self.declare(
            &name,
            SymbolEntry::Procedure {
                label: label.clone(),
                level,
            },
        )?;
        self.frames.push(Frame {
            label,
            level,
            frame_size: 0,
            is_procedure: true,
        });
        self.advance();

        self.expect(TokenKind::SColon)
    }

    fn n_stmt_part(&mut self) -> Result<(), Diagnostic> {
        self.rule("N_STMTPART", "N_COMPOUND");

        let (label, level, is_procedure) = {
            let f = self.frames.last().expect("frame stack empty");
            (f.label.clone(), f.level, f.is_procedure)
        };

        self.emitter.emit_label(&label);
        if is_procedure {
            self.emitter.emit_save(level);
            let frame_size = self.frames.last().unwrap().frame_size;
            if frame_size > 0 {
                self.emitter.emit_asp(frame_size);
            }
        }

        self.n_compound()?;

        let frame_size = self.frames.last().unwrap().frame_size;
        if is_procedure {
            if frame_size > 0 {
                self.emitter.emit_asp(-frame_size);
            }
            self.emitter.emit_ji();
        } else {
            self.emitter.emit_halt();
            self.emitter.emit_stack_bss();
            self.emitter.emit_end();
        }

        self.frames.pop().expect("frame stack empty");
        Ok(())
    }

    fn n_compound(&mut self) -> Result<(), Diagnostic> {
        self.rule("N_COMPOUND", "T_BEGIN N_STMT N_STMTLST T_END");
        self.expect(TokenKind::Begin)?;
        self.n_stmt()?;
        self.n_stmt_lst()?;
        self.expect(TokenKind::End)
    }

    fn n_stmt_lst(&mut self) -> Result<(), Diagnostic> {
        if self.kind() == Some(TokenKind::SColon) {
            self.rule("N_STMTLST", "T_SCOLON N_STMT N_STMTLST");
            self.advance();
            self.n_stmt()?;
            self.n_stmt_lst()?;
        } else {
            self.rule("N_STMTLST", "epsilon");
        }
        Ok(())
    }

    fn n_stmt(&mut self) -> Result<(), Diagnostic> {
        match self.kind() {
            Some(TokenKind::Ident) => {
                let name = self.lexeme();
                let entry = self.search_id(&name)?;
                if let SymbolEntry::Procedure { label, level, .. } = entry {
                    self.emit_call(&label, level);
                    self.rule("N_STMT", "N_PROCSTMT");
                    self.n_proc_stmt()
                } else {
                    self.rule("N_STMT", "N_ASSIGN");
                    self.n_assign()
                }
            }
            Some(TokenKind::Read) => {
                self.rule("N_STMT", "N_READ");
                self.n_read()
            }
            Some(TokenKind::Write) => {
                self.rule("N_STMT", "N_WRITE");
                self.n_write()
            }
            Some(TokenKind::If) => {
                self.rule("N_STMT", "N_CONDITION");
                self.n_condition()
            }
            Some(TokenKind::While) => {
                self.rule("N_STMT", "N_WHILE");
                self.n_while()
            }
            Some(TokenKind::Begin) => {
                self.rule("N_STMT", "N_COMPOUND");
                self.n_compound()
            }
            _ => Err(self.syntax_error()),
        }
    }

    /// Static-link setup/call/teardown. The push/pop loops run from the
    /// caller's level down to (and up from) one below the callee's level,
    /// inclusive on both ends.
    fn emit_call(&mut self, label: &str, callee_level: u32) {
        let caller_level = self.current_level() as i64;
        let lower = callee_level as i64 - 1;
        debug_assert!(lower >= 0, "a procedure is never declared at level 0");

        let mut i = caller_level;
        while i >= lower {
            self.emitter.emit_push(i as u32);
            i -= 1;
        }

        self.emitter.emit_js(label);

        let mut i = lower;
        while i <= caller_level {
            self.emitter.emit_pop(i as u32);
            i += 1;
        }
    }

    fn n_proc_stmt(&mut self) -> Result<(), Diagnostic> {
        self.rule("N_PROCSTMT", "N_PROCIDENT");
        self.n_proc_ident()
    }

    fn n_proc_ident(&mut self) -> Result<(), Diagnostic> {
        self.rule("N_PROCIDENT", "T_IDENT");
        self.expect(TokenKind::Ident)
    }

    fn n_assign(&mut self) -> Result<(), Diagnostic> {
        self.rule("N_ASSIGN", "N_VARIABLE T_ASSIGN N_EXPR");

        let name = self.lexeme();
        let entry = self.search_id(&name)?;
        self.emitter.emit_la(entry.offset().unwrap_or(0), entry.level());

        let var_type = self.n_variable()?;
        if var_type == Type::Array {
            return Err(Diagnostic::ArrayMustBeIndexed(self.line));
        }

        self.expect(TokenKind::Assign)?;
        let expr_type = self.n_expr()?;
        self.emitter.emit_st();

        if expr_type == Type::Array {
            Err(Diagnostic::ArrayMustBeIndexed(self.line))
        } else if expr_type == Type::Procedure {
            Err(Diagnostic::ProcedureVariableMismatch(self.line))
        } else if var_type != expr_type {
            Err(Diagnostic::AssignmentTypeMismatch(self.line))
        } else {
            Ok(())
        }
    }

    fn n_read(&mut self) -> Result<(), Diagnostic> {
        self.rule("N_READ", "T_READ T_LPAREN N_INPUTVAR N_INPUTLST T_RPAREN");
        self.expect(TokenKind::Read)?;
        self.expect(TokenKind::LParen)?;
        self.n_input_var()?;
        self.n_input_lst()?;
        self.expect(TokenKind::RParen)
    }

    fn n_input_lst(&mut self) -> Result<(), Diagnostic> {
        if self.kind() == Some(TokenKind::Comma) {
            self.rule("N_INPUTLST", "T_COMMA N_INPUTVAR N_INPUTLST");
            self.advance();
            self.n_input_var()?;
            self.n_input_lst()?;
        } else {
            self.rule("N_INPUTLST", "epsilon");
        }
        Ok(())
    }

    fn n_input_var(&mut self) -> Result<(), Diagnostic> {
        self.rule("N_INPUTVAR", "N_VARIABLE");

        let name = self.lexeme();
        let entry = self.search_id(&name)?;
        self.emitter.emit_la(entry.offset().unwrap_or(0), entry.level());
        match entry.ty() {
            Type::Integer => self.emitter.emit_iread(),
            Type::Char => self.emitter.emit_cread(),
            _ => {}
        }
        self.emitter.emit_st();

        let var_type = self.n_variable()?;
        if !var_type.is_io_compatible() {
            return Err(Diagnostic::BadReadTarget(self.line));
        }
        Ok(())
    }

    fn n_write(&mut self) -> Result<(), Diagnostic> {
        self.rule("N_WRITE", "T_WRITE T_LPAREN N_OUTPUT N_OUTPUTLST T_RPAREN");
        self.expect(TokenKind::Write)?;
        self.expect(TokenKind::LParen)?;
        self.n_output()?;
        self.n_output_lst()?;
        self.expect(TokenKind::RParen)
    }

    fn n_output_lst(&mut self) -> Result<(), Diagnostic> {
        if self.kind() == Some(TokenKind::Comma) {
            self.rule("N_OUTPUTLST", "T_COMMA N_OUTPUT N_OUTPUTLST");
            self.advance();
            self.n_output()?;
            self.n_output_lst()?;
        } else {
            self.rule("N_OUTPUTLST", "epsilon");
        }
        Ok(())
    }

    fn n_output(&mut self) -> Result<(), Diagnostic> {
        self.rule("N_OUTPUT", "N_EXPR");
        let expr_type = self.n_expr()?;
        match expr_type {
            Type::Integer => {
                self.emitter.emit_iwrite();
                Ok(())
            }
            Type::Char => {
                self.emitter.emit_cwrite();
                Ok(())
            }
            _ => Err(Diagnostic::BadWriteExpression(self.line)),
        }
    }

    fn n_condition(&mut self) -> Result<(), Diagnostic> {
        self.rule("N_CONDITION", "T_IF N_EXPR T_THEN N_STMT N_ELSEPART");
        self.expect(TokenKind::If)?;
        let expr_type = self.n_expr()?;

        let else_label = self.emitter.new_label();
        let post_label = self.emitter.new_label();
        self.emitter.emit_jf(&else_label);

        if expr_type != Type::Boolean {
            return Err(Diagnostic::ExpectedBoolean(self.line));
        }

        self.expect(TokenKind::Then)?;
        self.n_stmt()?;

        self.emitter.emit_jp(&post_label);
        self.emitter.emit_label(&else_label);
        self.n_else_part()?;
        self.emitter.emit_label(&post_label);
        Ok(())
    }

    fn n_else_part(&mut self) -> Result<(), Diagnostic> {
        if self.kind() == Some(TokenKind::Else) {
            self.rule("N_ELSEPART", "T_ELSE N_STMT");
            self.advance();
            self.n_stmt()?;
        } else {
            self.rule("N_ELSEPART", "epsilon");
        }
        Ok(())
    }

    fn n_while(&mut self) -> Result<(), Diagnostic> {
        self.rule("N_WHILE", "T_WHILE N_EXPR T_DO N_STMT");
        self.expect(TokenKind::While)?;

        let top_label = self.emitter.new_label();
        self.emitter.emit_label(&top_label);

        let expr_type = self.n_expr()?;
        if expr_type != Type::Boolean {
            return Err(Diagnostic::ExpectedBoolean(self.line));
        }

        self.expect(TokenKind::Do)?;
        let post_label = self.emitter.new_label();
        self.emitter.emit_jf(&post_label);

        self.n_stmt()?;

        self.emitter.emit_jp(&top_label);
        self.emitter.emit_label(&post_label);
        Ok(())
    }

    fn n_expr(&mut self) -> Result<Type, Diagnostic> {
        self.rule("N_EXPR", "N_SIMPLEEXPR N_OPEXPR");
        let simple_type = self.n_simple_expr()?;

        if let Some((op, op_type)) = self.n_op_expr()? {
            if op_type != simple_type {
                return Err(Diagnostic::OperandTypeMismatch(self.line));
            }
            match op {
                RelOp::Lt => self.emitter.emit_lt(),
                RelOp::Le => self.emitter.emit_le(),
                RelOp::Ne => self.emitter.emit_ne(),
                RelOp::Eq => self.emitter.emit_eq(),
                RelOp::Gt => self.emitter.emit_gt(),
                RelOp::Ge => self.emitter.emit_ge(),
            }
            Ok(Type::Boolean)
        } else {
            Ok(simple_type)
        }
    }

    fn n_op_expr(&mut self) -> Result<Option<(RelOp, Type)>, Diagnostic> {
        if matches!(
            self.kind(),
            Some(TokenKind::Lt)
                | Some(TokenKind::Le)
                | Some(TokenKind::Ne)
                | Some(TokenKind::Eq)
                | Some(TokenKind::Gt)
                | Some(TokenKind::Ge)
        ) {
            self.rule("N_OPEXPR", "N_RELOP N_SIMPLEEXPR");
            let op = self.n_rel_op()?;
            let simple_type = self.n_simple_expr()?;
            Ok(Some((op, simple_type)))
        } else {
            self.rule("N_OPEXPR", "epsilon");
            Ok(None)
        }
    }

    fn n_rel_op(&mut self) -> Result<RelOp, Diagnostic> {
        self.rule("N_RELOP", "relational operator");
        let op = match self.kind() {
            Some(TokenKind::Lt) => RelOp::Lt,
            Some(TokenKind::Le) => RelOp::Le,
            Some(TokenKind::Ne) => RelOp::Ne,
            Some(TokenKind::Eq) => RelOp::Eq,
            Some(TokenKind::Gt) => RelOp::Gt,
            Some(TokenKind::Ge) => RelOp::Ge,
            _ => return Err(self.syntax_error()),
        };
        self.advance();
        Ok(op)
    }

    fn n_simple_expr(&mut self) -> Result<Type, Diagnostic> {
        self.rule("N_SIMPLEEXPR", "N_TERM N_ADDOPLST");
        let term_type = self.n_term()?;
        self.n_add_op_lst(term_type)?;
        Ok(term_type)
    }

    fn n_add_op(&mut self) -> Result<AddOp, Diagnostic> {
        self.rule("N_ADDOP", "additive operator");
        let op = match self.kind() {
            Some(TokenKind::Plus) => AddOp::Plus,
            Some(TokenKind::Minus) => AddOp::Minus,
            Some(TokenKind::Or) => AddOp::Or,
            _ => return Err(self.syntax_error()),
        };
        self.advance();
        Ok(op)
    }

    fn n_add_op_lst(&mut self, lhs_type: Type) -> Result<(), Diagnostic> {
        if matches!(
            self.kind(),
            Some(TokenKind::Plus) | Some(TokenKind::Minus) | Some(TokenKind::Or)
        ) {
            self.rule("N_ADDOPLST", "N_ADDOP N_TERM N_ADDOPLST");
            let op = self.n_add_op()?;
            let rhs_type = self.n_term()?;
            self.n_add_op_lst(rhs_type)?;

            match op {
                AddOp::Or => {
                    if lhs_type != Type::Boolean || rhs_type != Type::Boolean {
                        return Err(Diagnostic::ExpectedBoolean(self.line));
                    }
                    self.emitter.emit_or();
                }
                AddOp::Plus => {
                    if lhs_type != Type::Integer || rhs_type != Type::Integer {
                        return Err(Diagnostic::ExpectedInteger(self.line));
                    }
                    self.emitter.emit_add();
                }
                AddOp::Minus => {
                    if lhs_type != Type::Integer || rhs_type != Type::Integer {
                        return Err(Diagnostic::ExpectedInteger(self.line));
                    }
                    self.emitter.emit_sub();
                }
            }
        } else {
            self.rule("N_ADDOPLST", "epsilon");
        }
        Ok(())
    }

    fn n_term(&mut self) -> Result<Type, Diagnostic> {
        self.rule("N_TERM", "N_FACTOR N_MULTOPLST");
        let factor_type = self.n_factor()?;
        self.n_mult_op_lst(factor_type)?;
        Ok(factor_type)
    }

    fn n_mult_op(&mut self) -> Result<MulOp, Diagnostic> {
        self.rule("N_MULTOP", "multiplicative operator");
        let op = match self.kind() {
            Some(TokenKind::Mult) => MulOp::Mult,
            Some(TokenKind::Div) => MulOp::Div,
            Some(TokenKind::And) => MulOp::And,
            _ => return Err(self.syntax_error()),
        };
        self.advance();
        Ok(op)
    }

    fn n_mult_op_lst(&mut self, lhs_type: Type) -> Result<(), Diagnostic> {
        if matches!(
            self.kind(),
            Some(TokenKind::Mult) | Some(TokenKind::Div) | Some(TokenKind::And)
        ) {
            self.rule("N_MULTOPLST", "N_MULTOP N_FACTOR N_MULTOPLST");
            let op = self.n_mult_op()?;
            let rhs_type = self.n_factor()?;
            self.n_mult_op_lst(rhs_type)?;

            match op {
                MulOp::And => {
                    if lhs_type != Type::Boolean || rhs_type != Type::Boolean {
                        return Err(Diagnostic::ExpectedBoolean(self.line));
                    }
                    self.emitter.emit_and();
                }
                MulOp::Mult => {
                    if lhs_type != Type::Integer || rhs_type != Type::Integer {
                        return Err(Diagnostic::ExpectedInteger(self.line));
                    }
                    self.emitter.emit_mul();
                }
                MulOp::Div => {
                    if lhs_type != Type::Integer || rhs_type != Type::Integer {
                        return Err(Diagnostic::ExpectedInteger(self.line));
                    }
                    self.emitter.emit_div();
                }
            }
        } else {
            self.rule("N_MULTOPLST", "epsilon");
        }
        Ok(())
    }

    fn n_factor(&mut self) -> Result<Type, Diagnostic> {
        match self.kind() {
            Some(TokenKind::Plus) | Some(TokenKind::Minus) | Some(TokenKind::Ident) => {
                self.rule("N_FACTOR", "N_SIGN N_VARIABLE");
                let sign = self.n_sign()?;

                let name = self.lexeme();
                let entry = self.search_id(&name)?;
                self.emitter.emit_la(entry.offset().unwrap_or(0), entry.level());
                self.emitter.emit_deref();

                let var_type = self.n_variable()?;

                if let Some(sign) = sign {
                    if var_type != Type::Integer {
                        return Err(Diagnostic::ExpectedInteger(self.line));
                    }
                    if sign == Sign::Minus {
                        self.emitter.emit_neg();
                    }
                }
                Ok(var_type)
            }
            Some(TokenKind::IntConst)
            | Some(TokenKind::CharConst)
            | Some(TokenKind::True)
            | Some(TokenKind::False) => {
                self.rule("N_FACTOR", "N_CONST");
                self.n_const()
            }
            Some(TokenKind::LParen) => {
                self.rule("N_FACTOR", "T_LPAREN N_EXPR T_RPAREN");
                self.advance();
                let expr_type = self.n_expr()?;
                self.expect(TokenKind::RParen)?;
                Ok(expr_type)
            }
            Some(TokenKind::Not) => {
                self.rule("N_FACTOR", "T_NOT N_FACTOR");
                self.advance();
                let factor_type = self.n_factor()?;
                self.emitter.emit_not();
                if factor_type != Type::Boolean {
                    return Err(Diagnostic::ExpectedBoolean(self.line));
                }
                Ok(Type::Boolean)
            }
            _ => Err(self.syntax_error()),
        }
    }

    /// Only a leading `+`/`-` before an identifier is accepted — not before
    /// a parenthesized expression or a constant.
    fn n_sign(&mut self) -> Result<Option<Sign>, Diagnostic> {
        match self.kind() {
            Some(TokenKind::Plus) => {
                self.rule("N_SIGN", "T_PLUS");
                self.advance();
                Ok(Some(Sign::Plus))
            }
            Some(TokenKind::Minus) => {
                self.rule("N_SIGN", "T_MINUS");
                self.advance();
                Ok(Some(Sign::Minus))
            }
            _ => {
                self.rule("N_SIGN", "epsilon");
                Ok(None)
            }
        }
    }

    fn n_variable(&mut self) -> Result<Type, Diagnostic> {
        self.rule("N_VARIABLE", "T_IDENT N_IDXVAR");
        if self.kind() != Some(TokenKind::Ident) {
            return Err(self.syntax_error());
        }

        let name = self.lexeme();
        let entry = self.search_id(&name)?;
        self.advance();

        if !matches!(entry, SymbolEntry::ArrayVar { .. }) && self.kind() == Some(TokenKind::LBrack)
        {
            return Err(Diagnostic::NotAnArray(self.line));
        }

        let is_indexed = self.n_idx_var()?;
        let result_type = if is_indexed {
            match &entry {
                SymbolEntry::ArrayVar { base_type, .. } => *base_type,
                other => other.ty(),
            }
        } else {
            entry.ty()
        };
        Ok(result_type)
    }

    fn n_idx_var(&mut self) -> Result<bool, Diagnostic> {
        if self.kind() == Some(TokenKind::LBrack) {
            self.rule("N_IDXVAR", "T_LBRACK N_EXPR T_RBRACK");
            self.advance();
            let expr_type = self.n_expr()?;

            if expr_type == Type::Procedure {
                return Err(Diagnostic::ProcedureVariableMismatch(self.line));
            } else if expr_type != Type::Integer {
                return Err(Diagnostic::BadIndexType(self.line));
            }

            self.expect(TokenKind::RBrack)?;
            Ok(true)
        } else {
            self.rule("N_IDXVAR", "epsilon");
            Ok(false)
        }
    }

    fn n_const(&mut self) -> Result<Type, Diagnostic> {
        match self.kind() {
            Some(TokenKind::IntConst) => {
                self.rule("N_CONST", "T_INTCONST");
                let value: i64 = self.lexeme().parse().map_err(|_| self.syntax_error())?;
                self.emitter.emit_lc(value);
                self.advance();
                Ok(Type::Integer)
            }
            Some(TokenKind::CharConst) => {
                self.rule("N_CONST", "T_CHARCONST");
                let lexeme = self.lexeme();
                let ch = lexeme.chars().nth(1).ok_or_else(|| self.syntax_error())?;
                self.emitter.emit_lc(ch as i64);
                self.advance();
                Ok(Type::Char)
            }
            Some(TokenKind::True) | Some(TokenKind::False) => {
                self.rule("N_CONST", "N_BOOLCONST");
                self.n_bool_const()
            }
            _ => Err(self.syntax_error()),
        }
    }

    fn n_bool_const(&mut self) -> Result<Type, Diagnostic> {
        match self.kind() {
            Some(TokenKind::True) => {
                self.rule("N_BOOLCONST", "T_TRUE");
                self.emitter.emit_lc(1);
                self.advance();
                Ok(Type::Boolean)
            }
            Some(TokenKind::False) => {
                self.rule("N_BOOLCONST", "T_FALSE");
                self.emitter.emit_lc(0);
                self.advance();
                Ok(Type::Boolean)
            }
            _ => Err(self.syntax_error()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compile(src: &str) -> Result<ParseOutput, Diagnostic> {
        Parser::new(src, false, false).parse()
    }

    #[test]
    fn minimal_program() {
        let out = compile("program p; begin end.").unwrap();
        assert!(out.code.contains("init L.0, 20, L.1, L.2, L.3"));
        assert!(out.code.trim_end().ends_with("end"));
    }

    #[test]
    fn integer_assignment_emits_expected_sequence() {
        let out = compile("program p; var x: integer; begin x := 1 + 2 end.").unwrap();
        let lines: Vec<&str> = out.code.lines().map(|l| l.trim()).collect();
        assert!(lines.contains(&"la 20, 0"));
        assert!(lines.contains(&"lc 1"));
        assert!(lines.contains(&"lc 2"));
        assert!(lines.contains(&"add"));
        assert!(lines.contains(&"st"));
    }

    #[test]
    fn type_mismatch_on_assignment() {
        let err = compile("program p; var x: integer; begin x := true end.").unwrap_err();
        assert_eq!(err, Diagnostic::AssignmentTypeMismatch(1));
    }

    #[test]
    fn undefined_identifier() {
        let err = compile("program p; begin x := 0 end.").unwrap_err();
        assert_eq!(err, Diagnostic::Undefined(1));
    }

    #[test]
    fn nested_procedure_call_uses_static_link() {
        let src = "program p;\nprocedure q;\nbegin end;\nbegin q end.";
        let out = compile(src).unwrap();
        let lines: Vec<&str> = out.code.lines().map(|l| l.trim()).collect();
        assert!(lines.contains(&"push 0, 0"));
        assert!(lines.contains(&"js L.4"));
        assert!(lines.contains(&"pop 0, 0"));
    }

    #[test]
    fn invalid_array_bounds() {
        let err = compile("program p; var a: array[5..1] of integer; begin end.").unwrap_err();
        assert_eq!(err, Diagnostic::BadArrayBounds(1));
    }

    #[test]
    fn multiply_defined_identifier_is_rejected() {
        let err =
            compile("program p; var x, x: integer; begin end.").unwrap_err();
        assert_eq!(err, Diagnostic::MultiplyDefined(1));
    }

    #[test]
    fn array_must_be_indexed_to_use_as_scalar() {
        let src = "program p; var a: array[1..3] of integer; var x: integer; begin x := a end.";
        let err = compile(src).unwrap_err();
        assert_eq!(err, Diagnostic::ArrayMustBeIndexed(1));
    }

    #[test]
    fn while_loop_emits_top_and_post_labels() {
        let src = "program p; var x: integer; begin while x <> 0 do x := x - 1 end.";
        let out = compile(src).unwrap();
        assert!(out.code.contains(".ne."));
        assert!(out.code.contains("jf"));
        assert!(out.code.contains("jp"));
    }

    #[test]
    fn debug_flag_emits_grammar_rule_trace() {
        let out = Parser::new("program p; begin end.", true, false)
            .parse()
            .unwrap();
        assert!(out.trace.contains("N_PROG ->"));
    }

    #[test]
    fn suppress_flag_silences_trace_stream() {
        let out = Parser::new("program p; begin end.", true, true)
            .parse()
            .unwrap();
        assert!(out.trace.is_empty());
    }
}
