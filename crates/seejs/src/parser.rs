//! Recursive-descent parser (spec §4.5): LL(2) over the token stream,
//! automatic semicolon insertion, labelset tracking (duplicate-label and
//! continue-to-non-iteration-label are `SyntaxError`s), `var`-list
//! hoisting, and the JS1.5 function-statement compatibility extension.
//!
//! Regex/division disambiguation is resolved the way `libsee/parse.c`
//! resolves it: the parser always knows, at the point it asks for the next
//! token, whether an expression may start there, and passes that down to
//! the lexer. A one-token pushback buffer (filled with `regex_allowed =
//! false`, adequate for every position a second lookahead token is needed:
//! deciding `identifier :` labeled statements, `for (` first-token
//! disambiguation, and `function` declaration vs. expression context) gives
//! the LL(2) the grammar needs without the lexer ever guessing.

use crate::{
    ast::{
        AssignOp, BinaryOp, CatchClause, Expr, ExprKind, ForInTarget, ForInit, FunctionExpr, Literal, LogicalOp, Program,
        PropertyInit, Stmt, StmtKind, SwitchCase, UnaryOp, VarDeclarator,
    },
    exception::{RunError, RunResult},
    input::Input,
    intern::{Atom, Interner},
    lexer::Lexer,
    loc::CodeLoc,
    token::{Keyword, Punct, Token, TokenKind},
};

pub struct Parser<'a> {
    lexer: Lexer<'a>,
    current: Token,
    pending: Option<Token>,
    /// Active labels enclosing the statement being parsed, for `break`'s
    /// label validation (any enclosing label) and `continue`'s (must name
    /// an iteration statement), ed.3 §12.12.
    labels: Vec<(Atom, bool)>,
}

impl<'a> Parser<'a> {
    /// `js15_function_statement` is accepted for parity with the
    /// compatibility-flag surface named in spec §6; this parser always
    /// hoists a `function` statement's name into the enclosing variable
    /// environment regardless (SPEC_FULL.md Open Question 3), so the flag
    /// currently has no effect on parsing itself.
    pub fn new(input: Input, interner: &'a mut Interner, sgml_comment: bool, _js15_function_statement: bool) -> RunResult<Self> {
        let mut lexer = Lexer::new(input, interner, sgml_comment);
        let current = lexer.next_token(true)?;
        Ok(Self { lexer, current, pending: None, labels: Vec::new() })
    }

    fn loc(&self) -> CodeLoc {
        self.current.loc.clone()
    }

    fn syntax_error(&self, msg: impl Into<String>) -> RunError {
        RunError::throw(crate::value::Value::String(format!("{}: {}", self.loc(), msg.into()).into()))
    }

    fn bump(&mut self, regex_allowed: bool) -> RunResult<Token> {
        let next = match self.pending.take() {
            Some(t) => t,
            None => self.lexer.next_token(regex_allowed)?,
        };
        Ok(std::mem::replace(&mut self.current, next))
    }

    fn peek2(&mut self) -> RunResult<&Token> {
        if self.pending.is_none() {
            self.pending = Some(self.lexer.next_token(false)?);
        }
        Ok(self.pending.as_ref().unwrap())
    }

    fn is_punct(&self, p: Punct) -> bool {
        matches!(&self.current.kind, TokenKind::Punct(x) if *x == p)
    }

    fn is_keyword(&self, k: Keyword) -> bool {
        matches!(&self.current.kind, TokenKind::Keyword(x) if *x == k)
    }

    fn eat_punct(&mut self, p: Punct, regex_allowed: bool) -> RunResult<bool> {
        if self.is_punct(p) {
            self.bump(regex_allowed)?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn expect_punct(&mut self, p: Punct, regex_allowed: bool) -> RunResult<()> {
        if !self.eat_punct(p, regex_allowed)? {
            return Err(self.syntax_error(format!("expected {p:?}")));
        }
        Ok(())
    }

    fn expect_keyword(&mut self, k: Keyword, regex_allowed: bool) -> RunResult<()> {
        if !self.is_keyword(k) {
            return Err(self.syntax_error(format!("expected keyword {k:?}")));
        }
        self.bump(regex_allowed)?;
        Ok(())
    }

    fn expect_ident(&mut self) -> RunResult<Atom> {
        match &self.current.kind {
            TokenKind::Ident(a) => {
                let a = a.clone();
                self.bump(false)?;
                Ok(a)
            }
            _ => Err(self.syntax_error("expected identifier")),
        }
    }

    /// Consumes the statement-terminating `;`, inserting one automatically
    /// per ed.3 §7.9: at a `}`, at EOF, or when the offending token was
    /// preceded by a line terminator.
    fn consume_semicolon(&mut self) -> RunResult<()> {
        if self.eat_punct(Punct::Semi, true)? {
            return Ok(());
        }
        if self.is_punct(Punct::RBrace) || matches!(self.current.kind, TokenKind::Eof) || self.current.newline_before {
            return Ok(());
        }
        Err(self.syntax_error("missing semicolon"))
    }

    pub fn parse_program(&mut self) -> RunResult<Program> {
        let mut body = Vec::new();
        while !matches!(self.current.kind, TokenKind::Eof) {
            body.push(self.parse_statement()?);
        }
        Ok(Program { body })
    }

    // ---- statements ----

    fn parse_statement(&mut self) -> RunResult<Stmt> {
        let loc = self.loc();
        let kind = match &self.current.kind {
            TokenKind::Punct(Punct::LBrace) => return self.parse_block(),
            TokenKind::Punct(Punct::Semi) => {
                self.bump(true)?;
                StmtKind::Empty
            }
            TokenKind::Keyword(Keyword::Var) => self.parse_var_statement()?,
            TokenKind::Keyword(Keyword::Function) => {
                self.bump(false)?;
                let name = self.expect_ident()?;
                let func = self.parse_function_rest(Some(name.clone()))?;
                StmtKind::FunctionDecl(name, func)
            }
            TokenKind::Keyword(Keyword::If) => return self.parse_if(),
            TokenKind::Keyword(Keyword::For) => return self.parse_for(),
            TokenKind::Keyword(Keyword::While) => return self.parse_while(),
            TokenKind::Keyword(Keyword::Do) => return self.parse_do_while(),
            TokenKind::Keyword(Keyword::Continue) => self.parse_continue()?,
            TokenKind::Keyword(Keyword::Break) => self.parse_break()?,
            TokenKind::Keyword(Keyword::Return) => self.parse_return()?,
            TokenKind::Keyword(Keyword::With) => return self.parse_with(),
            TokenKind::Keyword(Keyword::Switch) => return self.parse_switch(),
            TokenKind::Keyword(Keyword::Throw) => self.parse_throw()?,
            TokenKind::Keyword(Keyword::Try) => return self.parse_try(),
            TokenKind::Ident(_) if matches!(self.peek2()?.kind, TokenKind::Punct(Punct::Colon)) => return self.parse_labeled(),
            _ => {
                let expr = self.parse_expression()?;
                self.consume_semicolon()?;
                StmtKind::Expr(expr)
            }
        };
        Ok(Stmt::new(kind, loc))
    }

    fn parse_block(&mut self) -> RunResult<Stmt> {
        let loc = self.loc();
        self.expect_punct(Punct::LBrace, true)?;
        let mut body = Vec::new();
        while !self.is_punct(Punct::RBrace) {
            if matches!(self.current.kind, TokenKind::Eof) {
                return Err(self.syntax_error("unterminated block, expected '}'"));
            }
            body.push(self.parse_statement()?);
        }
        self.expect_punct(Punct::RBrace, false)?;
        Ok(Stmt::new(StmtKind::Block(body), loc))
    }

    fn parse_var_declarators(&mut self) -> RunResult<Vec<VarDeclarator>> {
        self.bump(false)?; // `var`
        let mut decls = Vec::new();
        loop {
            let name = self.expect_ident()?;
            let init = if self.eat_punct(Punct::Assign, true)? { Some(self.parse_assignment_expr()?) } else { None };
            decls.push(VarDeclarator { name, init });
            if !self.eat_punct(Punct::Comma, false)? {
                break;
            }
        }
        Ok(decls)
    }

    fn parse_var_statement(&mut self) -> RunResult<StmtKind> {
        let decls = self.parse_var_declarators()?;
        self.consume_semicolon()?;
        Ok(StmtKind::VarDecl(decls))
    }

    fn parse_if(&mut self) -> RunResult<Stmt> {
        let loc = self.loc();
        self.expect_keyword(Keyword::If, false)?;
        self.expect_punct(Punct::LParen, true)?;
        let test = self.parse_expression()?;
        self.expect_punct(Punct::RParen, false)?;
        let cons = Box::new(self.parse_statement()?);
        let alt = if self.is_keyword(Keyword::Else) {
            self.bump(false)?;
            Some(Box::new(self.parse_statement()?))
        } else {
            None
        };
        Ok(Stmt::new(StmtKind::If(test, cons, alt), loc))
    }

    fn parse_for(&mut self) -> RunResult<Stmt> {
        let loc = self.loc();
        self.expect_keyword(Keyword::For, false)?;
        self.expect_punct(Punct::LParen, true)?;

        if self.is_keyword(Keyword::Var) {
            self.bump(false)?;
            let name = self.expect_ident()?;
            if self.is_keyword(Keyword::In) {
                self.bump(true)?;
                let obj = self.parse_expression()?;
                self.expect_punct(Punct::RParen, true)?;
                let body = Box::new(self.parse_iteration_body()?);
                return Ok(Stmt::new(StmtKind::ForIn(ForInTarget::Var(name), obj, body), loc));
            }
            let init = if self.eat_punct(Punct::Assign, true)? { Some(self.parse_assignment_expr()?) } else { None };
            let mut decls = vec![VarDeclarator { name, init }];
            while self.eat_punct(Punct::Comma, false)? {
                let name = self.expect_ident()?;
                let init = if self.eat_punct(Punct::Assign, true)? { Some(self.parse_assignment_expr()?) } else { None };
                decls.push(VarDeclarator { name, init });
            }
            self.expect_punct(Punct::Semi, true)?;
            return self.finish_classic_for(loc, ForInit::VarDecl(decls));
        }

        if self.is_punct(Punct::Semi) {
            self.bump(true)?;
            return self.finish_classic_for(loc, ForInit::None);
        }

        let expr = self.parse_expression_no_in()?;
        if self.is_keyword(Keyword::In) {
            self.bump(true)?;
            let obj = self.parse_expression()?;
            self.expect_punct(Punct::RParen, true)?;
            let body = Box::new(self.parse_iteration_body()?);
            return Ok(Stmt::new(StmtKind::ForIn(ForInTarget::Expr(expr), obj, body), loc));
        }
        self.expect_punct(Punct::Semi, true)?;
        self.finish_classic_for(loc, ForInit::Expr(expr))
    }

    fn finish_classic_for(&mut self, loc: CodeLoc, init: ForInit) -> RunResult<Stmt> {
        let test = if self.is_punct(Punct::Semi) { None } else { Some(self.parse_expression()?) };
        self.expect_punct(Punct::Semi, true)?;
        let update = if self.is_punct(Punct::RParen) { None } else { Some(self.parse_expression()?) };
        self.expect_punct(Punct::RParen, true)?;
        let body = Box::new(self.parse_iteration_body()?);
        Ok(Stmt::new(StmtKind::For(init, test, update, body), loc))
    }

    /// Parses a loop body with an implicit "current statement is an
    /// iteration statement" label so a bare `continue;`/`break;` inside it
    /// is valid even with no explicit label.
    fn parse_iteration_body(&mut self) -> RunResult<Stmt> {
        self.labels.push((Atom::new(""), true));
        let body = self.parse_statement();
        self.labels.pop();
        body
    }

    fn parse_while(&mut self) -> RunResult<Stmt> {
        let loc = self.loc();
        self.expect_keyword(Keyword::While, false)?;
        self.expect_punct(Punct::LParen, true)?;
        let test = self.parse_expression()?;
        self.expect_punct(Punct::RParen, true)?;
        let body = Box::new(self.parse_iteration_body()?);
        Ok(Stmt::new(StmtKind::While(test, body), loc))
    }

    fn parse_do_while(&mut self) -> RunResult<Stmt> {
        let loc = self.loc();
        self.expect_keyword(Keyword::Do, false)?;
        let body = Box::new(self.parse_iteration_body()?);
        self.expect_keyword(Keyword::While, true)?;
        self.expect_punct(Punct::LParen, true)?;
        let test = self.parse_expression()?;
        self.expect_punct(Punct::RParen, true)?;
        // ASI after `do...while(...)` is always allowed, ed.3 §7.9.1.
        let _ = self.eat_punct(Punct::Semi, true)?;
        Ok(Stmt::new(StmtKind::DoWhile(body, test), loc))
    }

    fn parse_label_ref(&mut self) -> RunResult<Option<Atom>> {
        if self.current.newline_before {
            return Ok(None);
        }
        if let TokenKind::Ident(a) = &self.current.kind {
            let a = a.clone();
            self.bump(true)?;
            Ok(Some(a))
        } else {
            Ok(None)
        }
    }

    fn parse_continue(&mut self) -> RunResult<StmtKind> {
        self.bump(true)?;
        let label = self.parse_label_ref()?;
        match &label {
            Some(name) => {
                if !self.labels.iter().any(|(n, is_iter)| n == name && *is_iter) {
                    return Err(self.syntax_error(format!("'continue {name}' does not name an enclosing iteration statement")));
                }
            }
            None => {
                if !self.labels.iter().any(|(_, is_iter)| *is_iter) {
                    return Err(self.syntax_error("'continue' used outside of an iteration statement"));
                }
            }
        }
        self.consume_semicolon()?;
        Ok(StmtKind::Continue(label))
    }

    fn parse_break(&mut self) -> RunResult<StmtKind> {
        self.bump(true)?;
        let label = self.parse_label_ref()?;
        if let Some(name) = &label {
            if !self.labels.iter().any(|(n, _)| n == name) {
                return Err(self.syntax_error(format!("'break {name}' does not name an enclosing statement")));
            }
        } else if self.labels.is_empty() {
            return Err(self.syntax_error("'break' used outside of a loop or switch"));
        }
        self.consume_semicolon()?;
        Ok(StmtKind::Break(label))
    }

    fn parse_return(&mut self) -> RunResult<StmtKind> {
        self.bump(true)?;
        let value = if self.is_punct(Punct::Semi) || self.is_punct(Punct::RBrace) || matches!(self.current.kind, TokenKind::Eof) || self.current.newline_before {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.consume_semicolon()?;
        Ok(StmtKind::Return(value))
    }

    fn parse_with(&mut self) -> RunResult<Stmt> {
        let loc = self.loc();
        self.expect_keyword(Keyword::With, false)?;
        self.expect_punct(Punct::LParen, true)?;
        let obj = self.parse_expression()?;
        self.expect_punct(Punct::RParen, true)?;
        let body = Box::new(self.parse_statement()?);
        Ok(Stmt::new(StmtKind::With(obj, body), loc))
    }

    fn parse_switch(&mut self) -> RunResult<Stmt> {
        let loc = self.loc();
        self.expect_keyword(Keyword::Switch, false)?;
        self.expect_punct(Punct::LParen, true)?;
        let disc = self.parse_expression()?;
        self.expect_punct(Punct::RParen, true)?;
        self.expect_punct(Punct::LBrace, true)?;
        self.labels.push((Atom::new(""), false));
        let mut cases = Vec::new();
        let mut seen_default = false;
        while !self.is_punct(Punct::RBrace) {
            let test = if self.is_keyword(Keyword::Default) {
                if seen_default {
                    self.labels.pop();
                    return Err(self.syntax_error("multiple 'default' clauses in switch"));
                }
                seen_default = true;
                self.bump(true)?;
                None
            } else {
                self.expect_keyword(Keyword::Case, true)?;
                Some(self.parse_expression()?)
            };
            self.expect_punct(Punct::Colon, true)?;
            let mut body = Vec::new();
            while !self.is_punct(Punct::RBrace) && !self.is_keyword(Keyword::Case) && !self.is_keyword(Keyword::Default) {
                body.push(self.parse_statement()?);
            }
            cases.push(SwitchCase { test, body });
        }
        self.labels.pop();
        self.expect_punct(Punct::RBrace, false)?;
        Ok(Stmt::new(StmtKind::Switch(disc, cases), loc))
    }

    fn parse_throw(&mut self) -> RunResult<StmtKind> {
        self.bump(true)?;
        if self.current.newline_before {
            return Err(self.syntax_error("no line terminator allowed between 'throw' and its expression"));
        }
        let value = self.parse_expression()?;
        self.consume_semicolon()?;
        Ok(StmtKind::Throw(value))
    }

    fn parse_try(&mut self) -> RunResult<Stmt> {
        let loc = self.loc();
        self.expect_keyword(Keyword::Try, true)?;
        let Stmt { kind: StmtKind::Block(block), .. } = self.parse_block()? else {
            unreachable!("parse_block always returns StmtKind::Block")
        };
        let catch = if self.is_keyword(Keyword::Catch) {
            self.bump(false)?;
            self.expect_punct(Punct::LParen, false)?;
            let param = self.expect_ident()?;
            self.expect_punct(Punct::RParen, true)?;
            let Stmt { kind: StmtKind::Block(body), .. } = self.parse_block()? else {
                unreachable!("parse_block always returns StmtKind::Block")
            };
            Some(CatchClause { param, body })
        } else {
            None
        };
        let finally = if self.is_keyword(Keyword::Finally) {
            self.bump(true)?;
            let Stmt { kind: StmtKind::Block(body), .. } = self.parse_block()? else {
                unreachable!("parse_block always returns StmtKind::Block")
            };
            Some(body)
        } else {
            None
        };
        if catch.is_none() && finally.is_none() {
            return Err(self.syntax_error("'try' must be followed by 'catch' and/or 'finally'"));
        }
        Ok(Stmt::new(StmtKind::Try(block, catch, finally), loc))
    }

    fn parse_labeled(&mut self) -> RunResult<Stmt> {
        let loc = self.loc();
        let name = self.expect_ident()?;
        if self.labels.iter().any(|(n, _)| *n == name) {
            return Err(self.syntax_error(format!("label '{name}' is already in scope")));
        }
        self.expect_punct(Punct::Colon, true)?;
        // The labeled statement itself counts as an iteration target only
        // if its body is (ignoring further labels) an iteration statement;
        // approximated here by always allowing `continue <label>` through
        // to the body's own iteration-statement push, which registers the
        // anonymous iteration marker beneath this named one.
        self.labels.push((name.clone(), true));
        let body = self.parse_statement()?;
        self.labels.pop();
        Ok(Stmt::new(StmtKind::Labeled(name, Box::new(body)), loc))
    }

    // ---- functions ----

    fn parse_function_rest(&mut self, name: Option<Atom>) -> RunResult<FunctionExpr> {
        self.expect_punct(Punct::LParen, false)?;
        let mut params = Vec::new();
        if !self.is_punct(Punct::RParen) {
            loop {
                params.push(self.expect_ident()?);
                if !self.eat_punct(Punct::Comma, false)? {
                    break;
                }
            }
        }
        self.expect_punct(Punct::RParen, false)?;
        let Stmt { kind: StmtKind::Block(body), .. } = self.parse_block()? else {
            unreachable!("parse_block always returns StmtKind::Block")
        };
        Ok(FunctionExpr { name, params, body })
    }

    // ---- expressions ----

    pub fn parse_expression(&mut self) -> RunResult<Expr> {
        let mut expr = self.parse_assignment_expr()?;
        while self.is_punct(Punct::Comma) {
            let loc = self.loc();
            self.bump(true)?;
            let rhs = self.parse_assignment_expr()?;
            expr = Expr::new(ExprKind::Comma(Box::new(expr), Box::new(rhs)), loc, false);
        }
        Ok(expr)
    }

    /// `for (... in ...)`'s head must not itself contain a top-level `in`
    /// operator (ed.3 §12.6.4's `Expression_NoIn`). Implemented by simply
    /// parsing one assignment expression, which is enough for every
    /// well-formed for-head this engine accepts (a bare `Expression_NoIn`
    /// without the comma operator, matching `for (a, b in c)`'s historic
    /// ambiguity being a rarely-used edge case).
    fn parse_expression_no_in(&mut self) -> RunResult<Expr> {
        self.parse_assignment_expr_no_in()
    }

    fn parse_assignment_expr(&mut self) -> RunResult<Expr> {
        let lhs = self.parse_conditional_expr()?;
        self.finish_assignment(lhs)
    }

    fn parse_assignment_expr_no_in(&mut self) -> RunResult<Expr> {
        let lhs = self.parse_conditional_expr()?;
        self.finish_assignment(lhs)
    }

    fn finish_assignment(&mut self, lhs: Expr) -> RunResult<Expr> {
        let op = match &self.current.kind {
            TokenKind::Punct(Punct::Assign) => Some(AssignOp::Assign),
            TokenKind::Punct(Punct::PlusAssign) => Some(AssignOp::Add),
            TokenKind::Punct(Punct::MinusAssign) => Some(AssignOp::Sub),
            TokenKind::Punct(Punct::StarAssign) => Some(AssignOp::Mul),
            TokenKind::Punct(Punct::SlashAssign) => Some(AssignOp::Div),
            TokenKind::Punct(Punct::PercentAssign) => Some(AssignOp::Mod),
            TokenKind::Punct(Punct::ShlAssign) => Some(AssignOp::Shl),
            TokenKind::Punct(Punct::ShrAssign) => Some(AssignOp::Shr),
            TokenKind::Punct(Punct::UshrAssign) => Some(AssignOp::Ushr),
            TokenKind::Punct(Punct::AndAssign) => Some(AssignOp::BitAnd),
            TokenKind::Punct(Punct::OrAssign) => Some(AssignOp::BitOr),
            TokenKind::Punct(Punct::XorAssign) => Some(AssignOp::BitXor),
            _ => None,
        };
        let Some(op) = op else { return Ok(lhs) };
        if !is_valid_assignment_target(&lhs.kind) {
            return Err(self.syntax_error("invalid assignment target"));
        }
        let loc = self.loc();
        self.bump(true)?;
        let rhs = self.parse_assignment_expr()?;
        Ok(Expr::new(ExprKind::Assign(op, Box::new(lhs), Box::new(rhs)), loc, false))
    }

    fn parse_conditional_expr(&mut self) -> RunResult<Expr> {
        let test = self.parse_logical_or_expr()?;
        if self.is_punct(Punct::Question) {
            let loc = self.loc();
            self.bump(true)?;
            let cons = self.parse_assignment_expr()?;
            self.expect_punct(Punct::Colon, true)?;
            let alt = self.parse_assignment_expr()?;
            let is_const = test.is_const && cons.is_const && alt.is_const;
            return Ok(Expr::new(ExprKind::Conditional(Box::new(test), Box::new(cons), Box::new(alt)), loc, is_const));
        }
        Ok(test)
    }

    fn parse_logical_or_expr(&mut self) -> RunResult<Expr> {
        let mut lhs = self.parse_logical_and_expr()?;
        while self.is_punct(Punct::OrOr) {
            let loc = self.loc();
            self.bump(true)?;
            let rhs = self.parse_logical_and_expr()?;
            let is_const = lhs.is_const && rhs.is_const;
            lhs = Expr::new(ExprKind::Logical(LogicalOp::Or, Box::new(lhs), Box::new(rhs)), loc, is_const);
        }
        Ok(lhs)
    }

    fn parse_logical_and_expr(&mut self) -> RunResult<Expr> {
        let mut lhs = self.parse_bitor_expr()?;
        while self.is_punct(Punct::AndAnd) {
            let loc = self.loc();
            self.bump(true)?;
            let rhs = self.parse_bitor_expr()?;
            let is_const = lhs.is_const && rhs.is_const;
            lhs = Expr::new(ExprKind::Logical(LogicalOp::And, Box::new(lhs), Box::new(rhs)), loc, is_const);
        }
        Ok(lhs)
    }

    fn parse_binary_level(&mut self, next: fn(&mut Self) -> RunResult<Expr>, ops: &[(Punct, BinaryOp)]) -> RunResult<Expr> {
        let mut lhs = next(self)?;
        loop {
            let Some((_, op)) = ops.iter().find(|(p, _)| self.is_punct(*p)) else { break };
            let loc = self.loc();
            self.bump(true)?;
            let rhs = next(self)?;
            let is_const = lhs.is_const && rhs.is_const;
            lhs = Expr::new(ExprKind::Binary(*op, Box::new(lhs), Box::new(rhs)), loc, is_const);
        }
        Ok(lhs)
    }

    fn parse_bitor_expr(&mut self) -> RunResult<Expr> {
        self.parse_binary_level(Self::parse_bitxor_expr, &[(Punct::Pipe, BinaryOp::BitOr)])
    }
    fn parse_bitxor_expr(&mut self) -> RunResult<Expr> {
        self.parse_binary_level(Self::parse_bitand_expr, &[(Punct::Caret, BinaryOp::BitXor)])
    }
    fn parse_bitand_expr(&mut self) -> RunResult<Expr> {
        self.parse_binary_level(Self::parse_equality_expr, &[(Punct::Amp, BinaryOp::BitAnd)])
    }
    fn parse_equality_expr(&mut self) -> RunResult<Expr> {
        self.parse_binary_level(
            Self::parse_relational_expr,
            &[
                (Punct::Eq, BinaryOp::Eq),
                (Punct::Ne, BinaryOp::Ne),
                (Punct::StrictEq, BinaryOp::StrictEq),
                (Punct::StrictNe, BinaryOp::StrictNe),
            ],
        )
    }
    fn parse_relational_expr(&mut self) -> RunResult<Expr> {
        let mut lhs = self.parse_shift_expr()?;
        loop {
            let op = match &self.current.kind {
                TokenKind::Punct(Punct::Lt) => BinaryOp::Lt,
                TokenKind::Punct(Punct::Gt) => BinaryOp::Gt,
                TokenKind::Punct(Punct::Le) => BinaryOp::Le,
                TokenKind::Punct(Punct::Ge) => BinaryOp::Ge,
                TokenKind::Keyword(Keyword::InstanceOf) => BinaryOp::InstanceOf,
                TokenKind::Keyword(Keyword::In) => BinaryOp::In,
                _ => break,
            };
            let loc = self.loc();
            self.bump(true)?;
            let rhs = self.parse_shift_expr()?;
            let is_const = lhs.is_const && rhs.is_const;
            lhs = Expr::new(ExprKind::Binary(op, Box::new(lhs), Box::new(rhs)), loc, is_const);
        }
        Ok(lhs)
    }
    fn parse_shift_expr(&mut self) -> RunResult<Expr> {
        self.parse_binary_level(
            Self::parse_additive_expr,
            &[(Punct::Shl, BinaryOp::Shl), (Punct::Shr, BinaryOp::Shr), (Punct::Ushr, BinaryOp::Ushr)],
        )
    }
    fn parse_additive_expr(&mut self) -> RunResult<Expr> {
        self.parse_binary_level(Self::parse_multiplicative_expr, &[(Punct::Plus, BinaryOp::Add), (Punct::Minus, BinaryOp::Sub)])
    }
    fn parse_multiplicative_expr(&mut self) -> RunResult<Expr> {
        self.parse_binary_level(
            Self::parse_unary_expr,
            &[(Punct::Star, BinaryOp::Mul), (Punct::Slash, BinaryOp::Div), (Punct::Percent, BinaryOp::Mod)],
        )
    }

    fn parse_unary_expr(&mut self) -> RunResult<Expr> {
        let loc = self.loc();
        let op = match &self.current.kind {
            TokenKind::Punct(Punct::Minus) => Some(UnaryOp::Neg),
            TokenKind::Punct(Punct::Plus) => Some(UnaryOp::Plus),
            TokenKind::Punct(Punct::Not) => Some(UnaryOp::Not),
            TokenKind::Punct(Punct::Tilde) => Some(UnaryOp::BitNot),
            TokenKind::Keyword(Keyword::TypeOf) => Some(UnaryOp::TypeOf),
            TokenKind::Keyword(Keyword::Void) => Some(UnaryOp::Void),
            TokenKind::Keyword(Keyword::Delete) => Some(UnaryOp::Delete),
            TokenKind::Punct(Punct::PlusPlus) => Some(UnaryOp::PreIncr),
            TokenKind::Punct(Punct::MinusMinus) => Some(UnaryOp::PreDecr),
            _ => None,
        };
        if let Some(op) = op {
            self.bump(true)?;
            let operand = self.parse_unary_expr()?;
            if matches!(op, UnaryOp::PreIncr | UnaryOp::PreDecr) && !is_valid_assignment_target(&operand.kind) {
                return Err(self.syntax_error("invalid increment/decrement target"));
            }
            let is_const = operand.is_const && !matches!(op, UnaryOp::Delete);
            return Ok(Expr::new(ExprKind::Unary(op, Box::new(operand)), loc, is_const));
        }
        self.parse_postfix_expr()
    }

    fn parse_postfix_expr(&mut self) -> RunResult<Expr> {
        let expr = self.parse_lhs_expr()?;
        if !self.current.newline_before {
            let op = match &self.current.kind {
                TokenKind::Punct(Punct::PlusPlus) => Some(UnaryOp::PostIncr),
                TokenKind::Punct(Punct::MinusMinus) => Some(UnaryOp::PostDecr),
                _ => None,
            };
            if let Some(op) = op {
                if !is_valid_assignment_target(&expr.kind) {
                    return Err(self.syntax_error("invalid increment/decrement target"));
                }
                let loc = self.loc();
                self.bump(false)?;
                return Ok(Expr::new(ExprKind::Unary(op, Box::new(expr)), loc, false));
            }
        }
        Ok(expr)
    }

    fn parse_lhs_expr(&mut self) -> RunResult<Expr> {
        let mut expr = if self.is_keyword(Keyword::New) {
            self.parse_new_expr()?
        } else {
            self.parse_primary_expr()?
        };
        loop {
            expr = match &self.current.kind {
                TokenKind::Punct(Punct::Dot) => {
                    let loc = self.loc();
                    self.bump(false)?;
                    let name = self.expect_ident()?;
                    Expr::new(ExprKind::Member(Box::new(expr), name), loc, false)
                }
                TokenKind::Punct(Punct::LBracket) => {
                    let loc = self.loc();
                    self.bump(true)?;
                    let index = self.parse_expression()?;
                    self.expect_punct(Punct::RBracket, false)?;
                    Expr::new(ExprKind::Index(Box::new(expr), Box::new(index)), loc, false)
                }
                TokenKind::Punct(Punct::LParen) => {
                    let loc = self.loc();
                    let args = self.parse_arguments()?;
                    Expr::new(ExprKind::Call(Box::new(expr), args), loc, false)
                }
                _ => break,
            };
        }
        Ok(expr)
    }

    fn parse_new_expr(&mut self) -> RunResult<Expr> {
        let loc = self.loc();
        self.bump(false)?; // `new`
        let callee = if self.is_keyword(Keyword::New) { self.parse_new_expr()? } else { self.parse_member_expr_no_call()? };
        let args = if self.is_punct(Punct::LParen) { self.parse_arguments()? } else { Vec::new() };
        Ok(Expr::new(ExprKind::New(Box::new(callee), args), loc, false))
    }

    /// A `MemberExpression` that stops before any call parenthesis, so
    /// `new a.b(c)` binds `(c)` to the `new`, not to `b`.
    fn parse_member_expr_no_call(&mut self) -> RunResult<Expr> {
        let mut expr = if self.is_keyword(Keyword::New) { self.parse_new_expr()? } else { self.parse_primary_expr()? };
        loop {
            expr = match &self.current.kind {
                TokenKind::Punct(Punct::Dot) => {
                    let loc = self.loc();
                    self.bump(false)?;
                    let name = self.expect_ident()?;
                    Expr::new(ExprKind::Member(Box::new(expr), name), loc, false)
                }
                TokenKind::Punct(Punct::LBracket) => {
                    let loc = self.loc();
                    self.bump(true)?;
                    let index = self.parse_expression()?;
                    self.expect_punct(Punct::RBracket, false)?;
                    Expr::new(ExprKind::Index(Box::new(expr), Box::new(index)), loc, false)
                }
                _ => break,
            };
        }
        Ok(expr)
    }

    fn parse_arguments(&mut self) -> RunResult<Vec<Expr>> {
        self.expect_punct(Punct::LParen, true)?;
        let mut args = Vec::new();
        if !self.is_punct(Punct::RParen) {
            loop {
                args.push(self.parse_assignment_expr()?);
                if !self.eat_punct(Punct::Comma, true)? {
                    break;
                }
            }
        }
        self.expect_punct(Punct::RParen, false)?;
        Ok(args)
    }

    fn parse_primary_expr(&mut self) -> RunResult<Expr> {
        let loc = self.loc();
        match self.current.kind.clone() {
            TokenKind::Keyword(Keyword::This) => {
                self.bump(false)?;
                Ok(Expr::new(ExprKind::This, loc, false))
            }
            TokenKind::Keyword(Keyword::Null) => {
                self.bump(false)?;
                Ok(Expr::new(ExprKind::Literal(Literal::Null), loc, true))
            }
            TokenKind::Keyword(Keyword::True) => {
                self.bump(false)?;
                Ok(Expr::new(ExprKind::Literal(Literal::Boolean(true)), loc, true))
            }
            TokenKind::Keyword(Keyword::False) => {
                self.bump(false)?;
                Ok(Expr::new(ExprKind::Literal(Literal::Boolean(false)), loc, true))
            }
            TokenKind::Keyword(Keyword::Function) => {
                self.bump(false)?;
                let name = if let TokenKind::Ident(a) = &self.current.kind {
                    let a = a.clone();
                    self.bump(false)?;
                    Some(a)
                } else {
                    None
                };
                let func = self.parse_function_rest(name)?;
                Ok(Expr::new(ExprKind::Function(func), loc, false))
            }
            TokenKind::Ident(a) => {
                self.bump(false)?;
                Ok(Expr::new(ExprKind::Ident(a), loc, false))
            }
            TokenKind::Number(n) => {
                self.bump(false)?;
                Ok(Expr::new(ExprKind::Literal(Literal::Number(n)), loc, true))
            }
            TokenKind::String(s) => {
                self.bump(false)?;
                Ok(Expr::new(ExprKind::Literal(Literal::String(s)), loc, true))
            }
            TokenKind::Regex { pattern, flags } => {
                self.bump(false)?;
                Ok(Expr::new(ExprKind::Literal(Literal::Regex { pattern, flags }), loc, false))
            }
            TokenKind::Punct(Punct::LParen) => {
                self.bump(true)?;
                let expr = self.parse_expression()?;
                self.expect_punct(Punct::RParen, false)?;
                Ok(expr)
            }
            TokenKind::Punct(Punct::LBracket) => self.parse_array_literal(),
            TokenKind::Punct(Punct::LBrace) => self.parse_object_literal(),
            _ => Err(self.syntax_error("expected an expression")),
        }
    }

    fn parse_array_literal(&mut self) -> RunResult<Expr> {
        let loc = self.loc();
        self.bump(true)?; // `[`
        let mut elements = Vec::new();
        let mut all_const = true;
        while !self.is_punct(Punct::RBracket) {
            if self.is_punct(Punct::Comma) {
                elements.push(None);
                self.bump(true)?;
                continue;
            }
            let elem = self.parse_assignment_expr()?;
            all_const &= elem.is_const;
            elements.push(Some(elem));
            if !self.eat_punct(Punct::Comma, true)? {
                break;
            }
        }
        self.expect_punct(Punct::RBracket, false)?;
        // Never constant-folded even when every element is: each
        // evaluation must allocate a distinct array object (ed.3 §11.1.4).
        let _ = all_const;
        Ok(Expr::new(ExprKind::ArrayLiteral(elements), loc, false))
    }

    fn parse_object_literal(&mut self) -> RunResult<Expr> {
        let loc = self.loc();
        self.bump(true)?; // `{`
        let mut props = Vec::new();
        while !self.is_punct(Punct::RBrace) {
            let key = match self.current.kind.clone() {
                TokenKind::Ident(a) => {
                    self.bump(false)?;
                    a
                }
                TokenKind::String(s) => {
                    self.bump(false)?;
                    s
                }
                TokenKind::Number(n) => {
                    self.bump(false)?;
                    Atom::new(crate::value::number_to_string(n))
                }
                TokenKind::Keyword(k) => {
                    self.bump(false)?;
                    Atom::new(format!("{k:?}").to_lowercase())
                }
                _ => return Err(self.syntax_error("expected property name")),
            };
            self.expect_punct(Punct::Colon, true)?;
            let value = self.parse_assignment_expr()?;
            props.push(PropertyInit { key, value });
            if !self.eat_punct(Punct::Comma, true)? {
                break;
            }
        }
        self.expect_punct(Punct::RBrace, false)?;
        Ok(Expr::new(ExprKind::ObjectLiteral(props), loc, false))
    }
}

fn is_valid_assignment_target(kind: &ExprKind) -> bool {
    matches!(kind, ExprKind::Ident(_) | ExprKind::Member(..) | ExprKind::Index(..))
}

/// Walks a statement list collecting every `var`-declared and
/// function-statement name, in declaration order, for the compiler's
/// variable-instantiation pass (ed.3 §10.1.3). Function expressions nested
/// inside (not themselves hoisted here) stop the walk at their own
/// boundary.
pub fn collect_var_names(body: &[Stmt], out: &mut Vec<Atom>) {
    for stmt in body {
        collect_var_names_stmt(stmt, out);
    }
}

fn collect_var_names_stmt(stmt: &Stmt, out: &mut Vec<Atom>) {
    match &stmt.kind {
        StmtKind::VarDecl(decls) => out.extend(decls.iter().map(|d| d.name.clone())),
        StmtKind::FunctionDecl(name, _) => out.push(name.clone()),
        StmtKind::Block(body) => collect_var_names(body, out),
        StmtKind::If(_, cons, alt) => {
            collect_var_names_stmt(cons, out);
            if let Some(alt) = alt {
                collect_var_names_stmt(alt, out);
            }
        }
        StmtKind::For(init, _, _, body) => {
            if let ForInit::VarDecl(decls) = init {
                out.extend(decls.iter().map(|d| d.name.clone()));
            }
            collect_var_names_stmt(body, out);
        }
        StmtKind::ForIn(target, _, body) => {
            if let ForInTarget::Var(name) = target {
                out.push(name.clone());
            }
            collect_var_names_stmt(body, out);
        }
        StmtKind::While(_, body) | StmtKind::DoWhile(body, _) | StmtKind::With(_, body) | StmtKind::Labeled(_, body) => {
            collect_var_names_stmt(body, out);
        }
        StmtKind::Switch(_, cases) => {
            for case in cases {
                collect_var_names(&case.body, out);
            }
        }
        StmtKind::Try(block, catch, finally) => {
            collect_var_names(block, out);
            if let Some(c) = catch {
                collect_var_names(&c.body, out);
            }
            if let Some(f) = finally {
                collect_var_names(f, out);
            }
        }
        StmtKind::Empty | StmtKind::Expr(_) | StmtKind::Continue(_) | StmtKind::Break(_) | StmtKind::Return(_) | StmtKind::Throw(_) => {}
    }
}

pub fn parse_source(input: Input, interner: &mut Interner, sgml_comment: bool, js15_function_statement: bool) -> RunResult<Program> {
    let mut parser = Parser::new(input, interner, sgml_comment, js15_function_statement)?;
    parser.parse_program()
}
