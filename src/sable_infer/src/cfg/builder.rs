// Lowers a desugared method body into a CFG. Every assignment target gets
// a fresh local version; joins insert explicit copies in each predecessor.
// Unreachable statements are still lowered (into dangling blocks) so their
// syntactic diagnostics fire, then pruned.

use crate::cfg::{
    BasicBlock, Binding, BlockId, CastKind, Cfg, Instruction, LocalData, LocalRef, SendArg,
    Terminator, VariableUseSite,
};
use crate::resolve::{lookup_constant, resolve_type_expr};
use crate::SpannedError;
use log::trace;
use sable_core::{
    DiagnosticCode, GlobalState, LiteralValue, Symbols, SymbolRef, Type, TypeVarId,
};
use sable_syntax::{Arg, BlockLit, Expr, MethodDef, Rescue, Span, Stmt, WhenClause};
use std::collections::HashMap;

/// Builder output: the graph plus the constant references it resolved
/// (consumed by editor queries).
pub struct BuildOutput {
    pub cfg: Cfg,
    pub constant_refs: Vec<(Span, SymbolRef)>,
}

type Vars = HashMap<String, LocalRef>;

pub fn build_cfg(
    gs: &GlobalState,
    owner: SymbolRef,
    method: SymbolRef,
    def: &MethodDef,
    errors: &mut Vec<SpannedError>,
) -> BuildOutput {
    trace!("building cfg for {}", def.name);
    let type_params: HashMap<String, TypeVarId> = gs
        .symbol(method)
        .type_arguments
        .iter()
        .filter_map(|&ta| {
            gs.symbol(ta)
                .type_var
                .map(|v| (gs.name_str(gs.symbol(ta).name), v))
        })
        .collect();

    let mut b = Builder {
        gs,
        owner,
        method,
        type_params,
        blocks: Vec::new(),
        locals: Vec::new(),
        versions: HashMap::new(),
        link_counter: 0,
        constant_refs: Vec::new(),
        errors,
    };

    let entry = b.new_block();
    let exit = b.new_block();
    b.seal(exit, Terminator::Exit);

    let mut vars = Vars::new();
    for (i, param) in def.params.iter().enumerate() {
        let local = b.local(&param.name);
        b.push(
            entry,
            local,
            Instruction::LoadArg { index: i },
            param.span,
        );
        vars.insert(param.name.clone(), local);
    }

    let body_end = b.lower_stmts(entry, &def.body, &mut vars);
    if let Some((end, value)) = body_end {
        let span = def
            .body
            .last()
            .map(|s| s.span())
            .unwrap_or(def.name_span);
        let ret = b.temp();
        b.push(
            end,
            ret,
            Instruction::Return(VariableUseSite::new(value, span)),
            span,
        );
        b.seal(end, Terminator::Jump(exit));
    }

    let cfg = b.finalize(entry, exit);
    cfg.validate();
    BuildOutput {
        cfg,
        constant_refs: b.constant_refs,
    }
}

struct Builder<'gs, 'e> {
    gs: &'gs GlobalState,
    owner: SymbolRef,
    method: SymbolRef,
    type_params: HashMap<String, TypeVarId>,
    blocks: Vec<(Vec<Binding>, Option<Terminator>)>,
    locals: Vec<LocalData>,
    versions: HashMap<String, u32>,
    link_counter: u32,
    constant_refs: Vec<(Span, SymbolRef)>,
    errors: &'e mut Vec<SpannedError>,
}

impl<'gs, 'e> Builder<'gs, 'e> {
    fn new_block(&mut self) -> BlockId {
        let id = BlockId(self.blocks.len() as u32);
        self.blocks.push((Vec::new(), None));
        id
    }

    fn push(&mut self, block: BlockId, target: LocalRef, instr: Instruction, span: Span) {
        debug_assert!(
            self.blocks[block.0 as usize].1.is_none(),
            "binding appended after terminator"
        );
        self.blocks[block.0 as usize]
            .0
            .push(Binding { target, instr, span });
    }

    fn seal(&mut self, block: BlockId, terminator: Terminator) {
        let slot = &mut self.blocks[block.0 as usize].1;
        debug_assert!(slot.is_none(), "block sealed twice");
        *slot = Some(terminator);
    }

    fn local(&mut self, name: &str) -> LocalRef {
        let version = self.versions.entry(name.to_string()).or_insert(0);
        *version += 1;
        let r = LocalRef(self.locals.len() as u32);
        self.locals.push(LocalData {
            name: name.to_string(),
            version: *version,
            is_temp: name.starts_with('<'),
            is_merge: false,
        });
        r
    }

    fn temp(&mut self) -> LocalRef {
        self.local("<tmp>")
    }

    fn merge_local(&mut self, name: &str) -> LocalRef {
        let r = self.local(name);
        self.locals[r.0 as usize].is_merge = true;
        r
    }

    fn next_link(&mut self) -> u32 {
        self.link_counter += 1;
        self.link_counter
    }

    fn use_site(&self, var: LocalRef, span: Span) -> VariableUseSite {
        VariableUseSite::new(var, span)
    }

    // ---- joins ----------------------------------------------------------

    /// Join any number of live predecessor states into one block. Source
    /// variables that differ across predecessors get a merge slot with one
    /// copy per predecessor; variables missing on a path are completed
    /// with nil. Temporaries do not survive joins.
    fn merge_branches(&mut self, preds: Vec<(BlockId, Vars)>) -> (BlockId, Vars) {
        let join = self.new_block();
        let mut names: Vec<String> = Vec::new();
        for (_, vars) in &preds {
            for (name, r) in vars.iter() {
                if !self.locals[r.0 as usize].is_temp && !names.contains(name) {
                    names.push(name.clone());
                }
            }
        }
        names.sort();
        let mut merged = Vars::new();
        for name in names {
            let refs: Vec<Option<LocalRef>> =
                preds.iter().map(|(_, v)| v.get(&name).copied()).collect();
            let first = refs[0];
            if refs.iter().all(|r| *r == first) {
                if let Some(r) = first {
                    merged.insert(name, r);
                }
                continue;
            }
            let slot = self.merge_local(&name);
            for ((block, _), r) in preds.iter().zip(refs.iter()) {
                let instr = match r {
                    Some(r) => Instruction::Ident(*r),
                    None => Instruction::Literal(Type::nil()),
                };
                self.push(*block, slot, instr, Span::zero());
            }
            merged.insert(name, slot);
        }
        for (block, _) in &preds {
            self.seal(*block, Terminator::Jump(join));
        }
        (join, merged)
    }

    /// Join live branch ends that also carry a value: the branch values
    /// flow into one shared result slot, then the variable states merge as
    /// usual. `None` when no branch stayed live.
    fn merge_with_value(
        &mut self,
        slot_name: &str,
        preds: Vec<(BlockId, Vars, LocalRef)>,
        vars: &mut Vars,
    ) -> Option<(BlockId, LocalRef)> {
        if preds.is_empty() {
            return None;
        }
        let slot = self.merge_local(slot_name);
        self.locals[slot.0 as usize].is_temp = true;
        let var_preds: Vec<(BlockId, Vars)> = preds
            .into_iter()
            .map(|(block, pred_vars, value)| {
                self.push(block, slot, Instruction::Ident(value), Span::zero());
                (block, pred_vars)
            })
            .collect();
        let (join, merged) = self.merge_branches(var_preds);
        *vars = merged;
        Some((join, slot))
    }

    // ---- statements ------------------------------------------------------

    /// Lower a statement list. Returns the live end block and the value of
    /// the last statement, or `None` when every path terminated. Dead
    /// statements after a terminator are still lowered into a dangling
    /// block for their syntax-level diagnostics, then pruned.
    fn lower_stmts(
        &mut self,
        mut cur: BlockId,
        stmts: &[Stmt],
        vars: &mut Vars,
    ) -> Option<(BlockId, LocalRef)> {
        let mut last_value: Option<LocalRef> = None;
        let mut iter = stmts.iter();
        while let Some(stmt) = iter.next() {
            match self.lower_stmt(cur, stmt, vars) {
                Some((next, value)) => {
                    cur = next;
                    last_value = value;
                }
                None => {
                    let rest: Vec<&Stmt> = iter.collect();
                    if let Some(first_dead) = rest.first() {
                        self.errors.push(SpannedError::new(
                            DiagnosticCode::SBW03002,
                            "unreachable code",
                            first_dead.span(),
                        ));
                        let dead = self.new_block();
                        let mut dead_vars = vars.clone();
                        let dead_stmts: Vec<Stmt> = rest.iter().map(|s| (*s).clone()).collect();
                        if let Some((end, _)) =
                            self.lower_stmts(dead, &dead_stmts, &mut dead_vars)
                        {
                            self.seal(end, Terminator::Jump(dead));
                        }
                    }
                    return None;
                }
            }
        }
        let value = match last_value {
            Some(v) => v,
            None => {
                let v = self.temp();
                let span = stmts.last().map(|s| s.span()).unwrap_or(Span::zero());
                self.push(cur, v, Instruction::Literal(Type::nil()), span);
                v
            }
        };
        Some((cur, value))
    }

    /// Returns the continuation block and the statement's value (None for
    /// value-less statements), or `None` when flow terminated.
    fn lower_stmt(
        &mut self,
        cur: BlockId,
        stmt: &Stmt,
        vars: &mut Vars,
    ) -> Option<(BlockId, Option<LocalRef>)> {
        match stmt {
            Stmt::Expr(e) => {
                let (next, value) = self.lower_expr(cur, e, vars)?;
                Some((next, Some(value)))
            }
            Stmt::Assign {
                target,
                value,
                target_span,
                ..
            } => {
                let (next, rhs) = self.lower_expr(cur, value, vars)?;
                let local = self.local(target);
                self.push(next, local, Instruction::Ident(rhs), *target_span);
                vars.insert(target.clone(), local);
                Some((next, Some(local)))
            }
            Stmt::If {
                cond,
                then_body,
                else_body,
                ..
            } => {
                let (cond_end, c) = self.lower_expr(cur, cond, vars)?;
                let then_entry = self.new_block();
                let else_entry = self.new_block();
                self.seal(
                    cond_end,
                    Terminator::Cond {
                        var: c,
                        then_block: then_entry,
                        else_block: else_entry,
                    },
                );
                let mut then_vars = vars.clone();
                let then_end = self.lower_stmts(then_entry, then_body, &mut then_vars);
                let mut else_vars = vars.clone();
                let else_end = self.lower_stmts(else_entry, else_body, &mut else_vars);
                let mut preds = Vec::new();
                if let Some((b, v)) = then_end {
                    preds.push((b, then_vars, v));
                }
                if let Some((b, v)) = else_end {
                    preds.push((b, else_vars, v));
                }
                let (join, slot) = self.merge_with_value("<if-result>", preds, vars)?;
                Some((join, Some(slot)))
            }
            Stmt::While { cond, body, .. } => {
                let assigned = collect_assigned(body);
                // Loop-carried variables get their merge slot up front; the
                // entry edge copies the current version (or nil for
                // variables born inside the loop).
                let mut carried = Vec::new();
                for name in &assigned {
                    let slot = self.merge_local(name);
                    let instr = match vars.get(name) {
                        Some(r) => Instruction::Ident(*r),
                        None => Instruction::Literal(Type::nil()),
                    };
                    self.push(cur, slot, instr, Span::zero());
                    vars.insert(name.clone(), slot);
                    carried.push((name.clone(), slot));
                }
                let header = self.new_block();
                self.seal(cur, Terminator::Jump(header));
                let (cond_end, c) = self.lower_expr(header, cond, vars)?;
                let body_entry = self.new_block();
                let exit_block = self.new_block();
                self.seal(
                    cond_end,
                    Terminator::Cond {
                        var: c,
                        then_block: body_entry,
                        else_block: exit_block,
                    },
                );
                let mut body_vars = vars.clone();
                if let Some((body_end, _)) =
                    self.lower_stmts(body_entry, body, &mut body_vars)
                {
                    let copies: Vec<(LocalRef, LocalRef)> = carried
                        .iter()
                        .filter_map(|(name, slot)| {
                            body_vars
                                .get(name)
                                .filter(|r| *r != slot)
                                .map(|r| (*slot, *r))
                        })
                        .collect();
                    for (slot, r) in copies {
                        self.push(body_end, slot, Instruction::Ident(r), Span::zero());
                    }
                    self.seal(body_end, Terminator::Jump(header));
                }
                Some((exit_block, None))
            }
            Stmt::Case {
                scrutinee,
                whens,
                else_body,
                span,
            } => self.lower_case(cur, scrutinee, whens, else_body, *span, vars),
            Stmt::Begin {
                body,
                rescues,
                ensure_body,
                span,
            } => self.lower_begin(cur, body, rescues, ensure_body, *span, vars),
            Stmt::Return { value, span } => {
                let (end, v) = match value {
                    Some(e) => self.lower_expr(cur, e, vars)?,
                    None => {
                        let v = self.temp();
                        self.push(cur, v, Instruction::Literal(Type::nil()), *span);
                        (cur, v)
                    }
                };
                let ret = self.temp();
                let value_span = value.as_ref().map(|e| e.span()).unwrap_or(*span);
                self.push(
                    end,
                    ret,
                    Instruction::Return(self.use_site(v, value_span)),
                    *span,
                );
                self.seal(end, Terminator::Jump(BlockId(1)));
                None
            }
        }
    }

    fn lower_case(
        &mut self,
        cur: BlockId,
        scrutinee: &Expr,
        whens: &[WhenClause],
        else_body: &[Stmt],
        _span: Span,
        vars: &mut Vars,
    ) -> Option<(BlockId, Option<LocalRef>)> {
        let (mut test_block, scrut) = self.lower_expr(cur, scrutinee, vars)?;
        let mut arm_ends: Vec<(BlockId, Vars, LocalRef)> = Vec::new();
        for when in whens {
            // One test per pattern; any true pattern enters the arm body.
            let mut body_preds: Vec<(BlockId, Vars)> = Vec::new();
            for pattern in &when.patterns {
                let c = self.lower_pattern_test(test_block, scrut, pattern, vars);
                let true_stub = self.new_block();
                let next_test = self.new_block();
                self.seal(
                    test_block,
                    Terminator::Cond {
                        var: c,
                        then_block: true_stub,
                        else_block: next_test,
                    },
                );
                body_preds.push((true_stub, vars.clone()));
                test_block = next_test;
            }
            let (arm_entry, mut arm_vars) = self.merge_branches(body_preds);
            if let Some((arm_end, value)) =
                self.lower_stmts(arm_entry, &when.body, &mut arm_vars)
            {
                arm_ends.push((arm_end, arm_vars, value));
            }
        }
        let mut else_vars = vars.clone();
        let else_end = self.lower_stmts(test_block, else_body, &mut else_vars);
        if let Some((b, value)) = else_end {
            arm_ends.push((b, else_vars, value));
        }
        let (join, slot) = self.merge_with_value("<case-result>", arm_ends, vars)?;
        Some((join, Some(slot)))
    }

    /// `when Foo` tests `scrut.is_a?(Foo)`; any other pattern tests
    /// equality.
    fn lower_pattern_test(
        &mut self,
        block: BlockId,
        scrut: LocalRef,
        pattern: &Expr,
        vars: &mut Vars,
    ) -> LocalRef {
        let span = pattern.span();
        let arg = match pattern {
            Expr::Const(name, span) => {
                let t = self.temp();
                let instr = self.constant_instr(name, *span);
                self.push(block, t, instr, *span);
                let c = self.temp();
                self.push(
                    block,
                    c,
                    Instruction::Send {
                        recv: self.use_site(scrut, *span),
                        method: "is_a?".to_string(),
                        args: vec![SendArg {
                            keyword: None,
                            site: self.use_site(t, *span),
                        }],
                        link: None,
                        is_private_ok: false,
                        name_span: *span,
                    },
                    *span,
                );
                return c;
            }
            other => other,
        };
        // Equality test against a simple pattern, lowered in the test
        // block itself. Patterns with their own control flow get an
        // unanalyzable test instead of splitting the chain.
        let simple = matches!(
            arg,
            Expr::Nil(_)
                | Expr::True(_)
                | Expr::False(_)
                | Expr::Integer(..)
                | Expr::Float(..)
                | Expr::Str(..)
                | Expr::Sym(..)
                | Expr::Local(..)
        );
        if simple {
            if let Some((b, v)) = self.lower_expr(block, arg, vars) {
                debug_assert_eq!(b, block);
                let c = self.temp();
                self.push(
                    block,
                    c,
                    Instruction::Send {
                        recv: self.use_site(scrut, span),
                        method: "==".to_string(),
                        args: vec![SendArg {
                            keyword: None,
                            site: self.use_site(v, span),
                        }],
                        link: None,
                        is_private_ok: false,
                        name_span: span,
                    },
                    span,
                );
                return c;
            }
        }
        let c = self.temp();
        self.push(
            block,
            c,
            Instruction::NotSupported("complex case pattern".to_string()),
            span,
        );
        c
    }

    fn lower_begin(
        &mut self,
        cur: BlockId,
        body: &[Stmt],
        rescues: &[Rescue],
        ensure_body: &[Stmt],
        span: Span,
        vars: &mut Vars,
    ) -> Option<(BlockId, Option<LocalRef>)> {
        // Whether the protected region raises is unknowable statically: a
        // synthetic condition forks between the body and the rescue chain,
        // and a second fork at the body's end routes the end-state into the
        // rescues as well, approximating "raise anywhere in the region" by
        // its entry and exit states.
        let fork = self.temp();
        self.push(cur, fork, Instruction::Unanalyzable, span);
        let body_entry = self.new_block();
        let rescue_stub_entry = self.new_block();
        self.seal(
            cur,
            Terminator::Cond {
                var: fork,
                then_block: body_entry,
                else_block: rescue_stub_entry,
            },
        );

        let mut rescue_preds = vec![(rescue_stub_entry, vars.clone())];
        let mut normal_ends: Vec<(BlockId, Vars, LocalRef)> = Vec::new();

        let mut body_vars = vars.clone();
        if let Some((body_end, body_value)) = self.lower_stmts(body_entry, body, &mut body_vars) {
            let late_fork = self.temp();
            self.push(body_end, late_fork, Instruction::Unanalyzable, span);
            let ok_stub = self.new_block();
            let rescue_stub_late = self.new_block();
            self.seal(
                body_end,
                Terminator::Cond {
                    var: late_fork,
                    then_block: ok_stub,
                    else_block: rescue_stub_late,
                },
            );
            normal_ends.push((ok_stub, body_vars.clone(), body_value));
            rescue_preds.push((rescue_stub_late, body_vars));
        }

        if rescues.is_empty() {
            // No handlers: the exceptional path propagates out of the
            // method; modelled as flowing to the exit.
            let (rescue_head, _) = self.merge_branches(rescue_preds);
            let dead = self.temp();
            self.push(rescue_head, dead, Instruction::Unanalyzable, span);
            self.seal(rescue_head, Terminator::Jump(BlockId(1)));
        } else {
            let (mut chain, chain_vars) = self.merge_branches(rescue_preds);
            for rescue in rescues {
                let mut clause_vars = chain_vars.clone();
                let clause_entry = self.new_block();
                let next = self.new_block();
                let pick = self.temp();
                self.push(chain, pick, Instruction::Unanalyzable, rescue.span);
                self.seal(
                    chain,
                    Terminator::Cond {
                        var: pick,
                        then_block: clause_entry,
                        else_block: next,
                    },
                );
                if let Some((name, binder_span)) = &rescue.binder {
                    let ty = self.rescue_binder_type(rescue);
                    let local = self.local(name);
                    self.push(clause_entry, local, Instruction::Literal(ty), *binder_span);
                    clause_vars.insert(name.clone(), local);
                }
                if let Some((end, value)) =
                    self.lower_stmts(clause_entry, &rescue.body, &mut clause_vars)
                {
                    normal_ends.push((end, clause_vars, value));
                }
                chain = next;
            }
            // Unmatched exception: propagates out.
            let dead = self.temp();
            self.push(chain, dead, Instruction::Unanalyzable, span);
            self.seal(chain, Terminator::Jump(BlockId(1)));
        }

        let mut merged = vars.clone();
        let (join, slot) = self.merge_with_value("<begin-result>", normal_ends, &mut merged)?;
        // The finalizer runs on the normal path here; exceptional-path
        // finalization affects no state the checker tracks. Its own value
        // is discarded.
        let end = if ensure_body.is_empty() {
            join
        } else {
            let (end, _) = self.lower_stmts(join, ensure_body, &mut merged)?;
            end
        };
        *vars = merged;
        Some((end, Some(slot)))
    }

    fn rescue_binder_type(&mut self, rescue: &Rescue) -> Type {
        if rescue.classes.is_empty() {
            return Type::Class(Symbols::STANDARD_ERROR);
        }
        let mut comps = Vec::new();
        for (name, span) in &rescue.classes {
            match lookup_constant(self.gs, self.owner, name) {
                Some(sym) if self.gs.symbol(sym).is_class() => {
                    self.constant_refs.push((*span, sym));
                    comps.push(Type::Class(sym));
                }
                _ => {
                    self.errors.push(SpannedError::new(
                        DiagnosticCode::SBE02001,
                        format!("unable to resolve constant `{}`", name),
                        *span,
                    ));
                    comps.push(Type::Untyped);
                }
            }
        }
        Type::any(comps)
    }

    // ---- expressions ----------------------------------------------------

    fn lower_expr(
        &mut self,
        cur: BlockId,
        expr: &Expr,
        vars: &mut Vars,
    ) -> Option<(BlockId, LocalRef)> {
        match expr {
            Expr::Nil(span) => Some(self.literal(cur, Type::nil(), *span)),
            Expr::True(span) => Some(self.literal(
                cur,
                Type::Literal(LiteralValue::Bool(true)),
                *span,
            )),
            Expr::False(span) => Some(self.literal(
                cur,
                Type::Literal(LiteralValue::Bool(false)),
                *span,
            )),
            Expr::Integer(v, span) => Some(self.literal(
                cur,
                Type::Literal(LiteralValue::Integer(*v)),
                *span,
            )),
            Expr::Float(bits, span) => Some(self.literal(
                cur,
                Type::Literal(LiteralValue::Float(*bits)),
                *span,
            )),
            Expr::Str(s, span) => {
                let ty = match self.gs.lookup_name_utf8(s) {
                    Some(n) => Type::Literal(LiteralValue::Str(n)),
                    // Literal born on the fast path: its name is not in the
                    // frozen table, so it types as its class.
                    None => Type::Class(Symbols::STRING),
                };
                Some(self.literal(cur, ty, *span))
            }
            Expr::Sym(s, span) => {
                let ty = match self.gs.lookup_name_utf8(s) {
                    Some(n) => Type::Literal(LiteralValue::Sym(n)),
                    None => Type::Class(Symbols::SYMBOL),
                };
                Some(self.literal(cur, ty, *span))
            }
            Expr::SelfRef(span) => {
                let t = self.temp();
                self.push(cur, t, Instruction::LoadSelf, *span);
                Some((cur, t))
            }
            Expr::Local(name, span) => {
                if let Some(r) = vars.get(name) {
                    return Some((cur, *r));
                }
                // Bare identifier with no prior assignment: a zero-arg
                // self-send when such a method exists, otherwise an
                // undeclared variable.
                if self.self_method_exists(name) {
                    return self.lower_send_parts(cur, None, name, &[], None, true, *span, *span, vars);
                }
                self.errors.push(SpannedError::new(
                    DiagnosticCode::SBE03001,
                    format!("use of undeclared variable `{}`", name),
                    *span,
                ));
                let t = self.temp();
                self.push(cur, t, Instruction::Unanalyzable, *span);
                Some((cur, t))
            }
            Expr::Const(name, span) => {
                let t = self.temp();
                let instr = self.constant_instr(name, *span);
                self.push(cur, t, instr, *span);
                Some((cur, t))
            }
            Expr::Send {
                recv,
                name,
                args,
                block,
                safe,
                span,
                name_span,
            } => self.lower_send(
                cur,
                recv.as_deref(),
                name,
                args,
                block.as_deref(),
                *safe,
                *span,
                *name_span,
                vars,
            ),
            Expr::AndAnd(l, r, span) => self.lower_short_circuit(cur, l, r, true, *span, vars),
            Expr::OrOr(l, r, span) => self.lower_short_circuit(cur, l, r, false, *span, vars),
            Expr::Let { value, ty, span } => self.lower_cast(cur, value, ty, CastKind::Let, *span, vars),
            Expr::Cast { value, ty, span } => {
                self.lower_cast(cur, value, ty, CastKind::Cast, *span, vars)
            }
            Expr::AssertType { value, ty, span } => {
                self.lower_cast(cur, value, ty, CastKind::AssertType, *span, vars)
            }
            Expr::Absurd { value, span } => {
                let (end, v) = self.lower_expr(cur, value, vars)?;
                let t = self.temp();
                self.push(
                    end,
                    t,
                    Instruction::TAbsurd(self.use_site(v, value.span())),
                    *span,
                );
                Some((end, t))
            }
        }
    }

    fn literal(&mut self, cur: BlockId, ty: Type, span: Span) -> (BlockId, LocalRef) {
        let t = self.temp();
        self.push(cur, t, Instruction::Literal(ty), span);
        (cur, t)
    }

    fn constant_instr(&mut self, name: &str, span: Span) -> Instruction {
        match lookup_constant(self.gs, self.owner, name) {
            Some(sym) => {
                self.constant_refs.push((span, sym));
                Instruction::Alias(sym)
            }
            None => {
                self.errors.push(SpannedError::new(
                    DiagnosticCode::SBE02001,
                    format!("unable to resolve constant `{}`", name),
                    span,
                ));
                Instruction::Unanalyzable
            }
        }
    }

    fn self_method_exists(&self, name: &str) -> bool {
        let raw = match self.gs.lookup_name_utf8(name) {
            Some(n) => n,
            None => return false,
        };
        self.gs
            .linearization_of(self.owner)
            .iter()
            .any(|&anc| self.gs.symbol(anc).members.get(&raw).is_some())
    }

    #[allow(clippy::too_many_arguments)]
    fn lower_send(
        &mut self,
        cur: BlockId,
        recv: Option<&Expr>,
        name: &str,
        args: &[Arg],
        block: Option<&BlockLit>,
        safe: bool,
        span: Span,
        name_span: Span,
        vars: &mut Vars,
    ) -> Option<(BlockId, LocalRef)> {
        if safe {
            // `a&.m(...)` forks on `a.nil?`; the nil-check refinement
            // narrows the receiver on the call path.
            let (cur, r) = self.lower_expr(cur, recv.expect("safe send without receiver"), vars)?;
            let c = self.temp();
            self.push(
                cur,
                c,
                Instruction::Send {
                    recv: self.use_site(r, span),
                    method: "nil?".to_string(),
                    args: Vec::new(),
                    link: None,
                    is_private_ok: false,
                    name_span,
                },
                span,
            );
            let nil_branch = self.new_block();
            let call_branch = self.new_block();
            self.seal(
                cur,
                Terminator::Cond {
                    var: c,
                    then_block: nil_branch,
                    else_block: call_branch,
                },
            );
            let nil_result = self.temp();
            self.push(nil_branch, nil_result, Instruction::Literal(Type::nil()), span);
            let mut call_vars = vars.clone();
            let (call_end, call_result) = self.lower_send_with_recv_local(
                call_branch,
                r,
                name,
                args,
                block,
                false,
                span,
                name_span,
                &mut call_vars,
            )?;
            // The branch results merge through a shared slot.
            let slot = self.merge_local("<safe-result>");
            self.locals[slot.0 as usize].is_temp = true;
            self.push(nil_branch, slot, Instruction::Ident(nil_result), span);
            self.push(call_end, slot, Instruction::Ident(call_result), span);
            let join = self.new_block();
            self.seal(nil_branch, Terminator::Jump(join));
            self.seal(call_end, Terminator::Jump(join));
            *vars = call_vars;
            return Some((join, slot));
        }

        match recv {
            Some(r) => {
                let (cur, recv_local) = self.lower_expr(cur, r, vars)?;
                self.lower_send_with_recv_local(
                    cur, recv_local, name, args, block, false, span, name_span, vars,
                )
            }
            None => self.lower_send_parts(cur, None, name, args, block, true, span, name_span, vars),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn lower_send_parts(
        &mut self,
        cur: BlockId,
        recv_local: Option<LocalRef>,
        name: &str,
        args: &[Arg],
        block: Option<&BlockLit>,
        is_private_ok: bool,
        span: Span,
        name_span: Span,
        vars: &mut Vars,
    ) -> Option<(BlockId, LocalRef)> {
        let recv_local = match recv_local {
            Some(r) => r,
            None => {
                let t = self.temp();
                self.push(cur, t, Instruction::LoadSelf, name_span);
                t
            }
        };
        self.lower_send_with_recv_local(
            cur,
            recv_local,
            name,
            args,
            block,
            is_private_ok,
            span,
            name_span,
            vars,
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn lower_send_with_recv_local(
        &mut self,
        mut cur: BlockId,
        recv_local: LocalRef,
        name: &str,
        args: &[Arg],
        block: Option<&BlockLit>,
        is_private_ok: bool,
        span: Span,
        name_span: Span,
        vars: &mut Vars,
    ) -> Option<(BlockId, LocalRef)> {
        let mut send_args = Vec::new();
        for arg in args {
            let (next, v) = self.lower_expr(cur, &arg.value, vars)?;
            cur = next;
            send_args.push(SendArg {
                keyword: arg.keyword.clone(),
                site: self.use_site(v, arg.value.span()),
            });
        }
        let link = block.map(|_| self.next_link());
        let result = self.temp();
        self.push(
            cur,
            result,
            Instruction::Send {
                recv: self.use_site(recv_local, span),
                method: name.to_string(),
                args: send_args,
                link,
                is_private_ok,
                name_span,
            },
            span,
        );
        let (cur, result) = match (block, link) {
            (Some(block_lit), Some(link)) => {
                self.lower_block_region(cur, block_lit, link, span, vars)?
            }
            _ => (cur, result),
        };
        Some((cur, result))
    }

    /// A block literal is a conditionally-executed region: the runtime may
    /// call it zero or more times. Its assignments to enclosing locals
    /// merge back like an `if` branch; its value closes the send through
    /// `SolveConstraint`.
    fn lower_block_region(
        &mut self,
        cur: BlockId,
        block: &BlockLit,
        link: u32,
        span: Span,
        vars: &mut Vars,
    ) -> Option<(BlockId, LocalRef)> {
        let fork = self.temp();
        self.push(cur, fork, Instruction::Unanalyzable, span);
        let body_entry = self.new_block();
        let skip_stub = self.new_block();
        self.seal(
            cur,
            Terminator::Cond {
                var: fork,
                then_block: body_entry,
                else_block: skip_stub,
            },
        );
        let mut body_vars = vars.clone();
        let params_temp = self.temp();
        self.push(
            body_entry,
            params_temp,
            Instruction::LoadYieldParams { link },
            block.span,
        );
        for (param, param_span) in &block.params {
            let local = self.local(param);
            self.push(body_entry, local, Instruction::Ident(params_temp), *param_span);
            body_vars.insert(param.clone(), local);
        }
        let mut preds = vec![(skip_stub, vars.clone())];
        if let Some((body_end, value)) = self.lower_stmts(body_entry, &block.body, &mut body_vars)
        {
            let ret = self.temp();
            self.push(
                body_end,
                ret,
                Instruction::BlockReturn {
                    link,
                    value: self.use_site(value, block.span),
                },
                block.span,
            );
            preds.push((body_end, body_vars));
        }
        let (join, merged) = self.merge_branches(preds);
        *vars = merged;
        let solved = self.temp();
        self.push(join, solved, Instruction::SolveConstraint { link }, span);
        Some((join, solved))
    }

    fn lower_short_circuit(
        &mut self,
        cur: BlockId,
        l: &Expr,
        r: &Expr,
        is_and: bool,
        span: Span,
        vars: &mut Vars,
    ) -> Option<(BlockId, LocalRef)> {
        let (cur, lv) = self.lower_expr(cur, l, vars)?;
        let eval_rhs = self.new_block();
        let keep_lhs = self.new_block();
        let (then_block, else_block) = if is_and {
            (eval_rhs, keep_lhs)
        } else {
            (keep_lhs, eval_rhs)
        };
        self.seal(
            cur,
            Terminator::Cond {
                var: lv,
                then_block,
                else_block,
            },
        );
        let slot = self.merge_local(if is_and { "<and-result>" } else { "<or-result>" });
        self.locals[slot.0 as usize].is_temp = true;
        let mut rhs_vars = vars.clone();
        let rhs_end = self.lower_expr(eval_rhs, r, &mut rhs_vars);
        self.push(keep_lhs, slot, Instruction::Ident(lv), span);
        let join = self.new_block();
        self.seal(keep_lhs, Terminator::Jump(join));
        if let Some((rhs_end, rv)) = rhs_end {
            self.push(rhs_end, slot, Instruction::Ident(rv), span);
            self.seal(rhs_end, Terminator::Jump(join));
            *vars = rhs_vars;
        }
        Some((join, slot))
    }

    fn lower_cast(
        &mut self,
        cur: BlockId,
        value: &Expr,
        ty: &sable_syntax::TypeExpr,
        kind: CastKind,
        span: Span,
        vars: &mut Vars,
    ) -> Option<(BlockId, LocalRef)> {
        let (cur, v) = self.lower_expr(cur, value, vars)?;
        let resolved = resolve_type_expr(self.gs, self.owner, ty, &self.type_params, self.errors);
        let t = self.temp();
        self.push(
            cur,
            t,
            Instruction::Cast {
                value: self.use_site(v, value.span()),
                ty: resolved,
                kind,
            },
            span,
        );
        Some((cur, t))
    }

    // ---- finalization ---------------------------------------------------

    /// Prune unreachable blocks and renumber. The exit block is always
    /// kept: every loop and protected region has a static edge to it.
    fn finalize(&mut self, entry: BlockId, exit: BlockId) -> Cfg {
        // Seal stragglers: dangling diagnostic-only blocks jump to exit so
        // reachability math stays total before pruning.
        for (i, (_, term)) in self.blocks.iter_mut().enumerate() {
            if term.is_none() {
                debug_assert!(
                    BlockId(i as u32) != entry,
                    "entry block left unsealed"
                );
                *term = Some(Terminator::Jump(exit));
            }
        }

        let provisional: Vec<BasicBlock> = self
            .blocks
            .iter()
            .enumerate()
            .map(|(i, (bindings, term))| BasicBlock {
                id: BlockId(i as u32),
                bindings: bindings.clone(),
                terminator: term.clone().unwrap(),
            })
            .collect();
        let scaffold = Cfg {
            owner: self.owner,
            method: self.method,
            blocks: provisional,
            locals: self.locals.clone(),
            entry,
            exit,
        };
        let mut keep = scaffold.reachable();
        if !keep.contains(&exit) {
            keep.push(exit);
            keep.sort();
        }
        let mut remap = HashMap::new();
        for (new_id, old_id) in keep.iter().enumerate() {
            remap.insert(*old_id, BlockId(new_id as u32));
        }
        let blocks = keep
            .iter()
            .map(|old| {
                let b = scaffold.block(*old);
                BasicBlock {
                    id: remap[old],
                    bindings: b.bindings.clone(),
                    terminator: match b.terminator {
                        Terminator::Jump(t) => Terminator::Jump(remap[&t]),
                        Terminator::Cond {
                            var,
                            then_block,
                            else_block,
                        } => Terminator::Cond {
                            var,
                            then_block: remap[&then_block],
                            else_block: remap[&else_block],
                        },
                        Terminator::Exit => Terminator::Exit,
                    },
                }
            })
            .collect();
        Cfg {
            owner: self.owner,
            method: self.method,
            blocks,
            locals: self.locals.clone(),
            entry: remap[&entry],
            exit: remap[&exit],
        }
    }
}

/// Names assigned anywhere in a statement list, for loop-header merges.
fn collect_assigned(stmts: &[Stmt]) -> Vec<String> {
    let mut out = Vec::new();
    collect_assigned_into(stmts, &mut out);
    out.sort();
    out.dedup();
    out
}

fn collect_assigned_into(stmts: &[Stmt], out: &mut Vec<String>) {
    for stmt in stmts {
        match stmt {
            Stmt::Assign { target, .. } => out.push(target.clone()),
            Stmt::If {
                then_body,
                else_body,
                ..
            } => {
                collect_assigned_into(then_body, out);
                collect_assigned_into(else_body, out);
            }
            Stmt::While { body, .. } => collect_assigned_into(body, out),
            Stmt::Case {
                whens, else_body, ..
            } => {
                for w in whens {
                    collect_assigned_into(&w.body, out);
                }
                collect_assigned_into(else_body, out);
            }
            Stmt::Begin {
                body,
                rescues,
                ensure_body,
                ..
            } => {
                collect_assigned_into(body, out);
                for r in rescues {
                    collect_assigned_into(&r.body, out);
                }
                collect_assigned_into(ensure_body, out);
            }
            Stmt::Expr(_) | Stmt::Return { .. } => {}
        }
    }
}
