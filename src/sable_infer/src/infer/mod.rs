// Forward dataflow over the CFG: per-block environments merged by join at
// block entry, flow-sensitive refinements applied on branch edges, and
// dispatch per send. The lattice is finite per method, so the fixed point
// lands within a small multiple of the block count.

pub mod dispatch;
mod refine;

use crate::cfg::{BlockId, Cfg, Instruction, LocalRef, Terminator};
use crate::SpannedError;
use dispatch::{dispatch_send, show_widened, CallArg};
use log::{trace, warn};
use sable_core::types::{is_subtype, join, replace_self_type};
use sable_core::{DiagnosticCode, GlobalState, SymbolRef, Type};
use sable_syntax::Span;
use std::collections::HashMap;

pub type Env = HashMap<LocalRef, Type>;

#[derive(Debug, Default)]
pub struct InferResult {
    pub errors: Vec<SpannedError>,
    /// Computed type per source span, for hover.
    pub hover: Vec<(Span, Type)>,
    /// Resolved method targets, for definition/references.
    pub refs: Vec<(Span, SymbolRef)>,
}

/// Run inference over one method body. Fills use-site types in place and
/// returns diagnostics plus the editor-facing facts.
pub fn infer_cfg(gs: &GlobalState, cfg: &mut Cfg) -> InferResult {
    let self_ty = self_type(gs, cfg.owner);
    let declared_return = {
        let raw = gs.symbol(cfg.method).result_type.clone();
        replace_self_type(gs, &raw, &self_ty)
    };

    let nblocks = cfg.blocks.len();
    let mut entry_envs: Vec<Option<Env>> = vec![None; nblocks];
    entry_envs[cfg.entry.0 as usize] = Some(Env::new());

    // Fixed point over entry environments; diagnostics and annotations
    // wait for the final deterministic pass.
    let max_rounds = 4 * nblocks + 8;
    let mut rounds = 0;
    let mut link_results: HashMap<u32, Type> = HashMap::new();
    loop {
        let mut changed = false;
        for idx in 0..nblocks {
            let id = BlockId(idx as u32);
            let entry = match &entry_envs[idx] {
                Some(env) => env.clone(),
                None => continue,
            };
            let (out_then, out_else) = transfer_block(
                gs,
                cfg,
                id,
                entry,
                &self_ty,
                &declared_return,
                &mut link_results,
                None,
            );
            for (succ, env) in out_then.into_iter().chain(out_else) {
                let slot = &mut entry_envs[succ.0 as usize];
                match slot {
                    None => {
                        *slot = Some(env);
                        changed = true;
                    }
                    Some(existing) => {
                        if merge_into(gs, existing, &env) {
                            changed = true;
                        }
                    }
                }
            }
        }
        rounds += 1;
        if !changed {
            break;
        }
        if rounds >= max_rounds {
            warn!("inference did not stabilize after {} rounds", rounds);
            break;
        }
    }
    trace!("inference converged in {} rounds", rounds);

    // Final pass: emit diagnostics, write use-site types, collect facts.
    let mut result = InferResult::default();
    for idx in 0..nblocks {
        let id = BlockId(idx as u32);
        let entry = match &entry_envs[idx] {
            Some(env) => env.clone(),
            None => continue,
        };
        transfer_block(
            gs,
            cfg,
            id,
            entry,
            &self_ty,
            &declared_return,
            &mut link_results,
            Some(&mut result),
        );
    }
    result
}

/// The type of `self` inside a class body: the applied form when the class
/// is generic.
pub fn self_type(gs: &GlobalState, owner: SymbolRef) -> Type {
    let members = &gs.symbol(owner).type_members;
    if members.is_empty() {
        Type::Class(owner)
    } else {
        Type::Applied {
            class: owner,
            args: members
                .iter()
                .filter_map(|&m| gs.symbol(m).type_var.map(Type::TypeVar))
                .collect(),
        }
    }
}

/// Join `incoming` into `existing` per local; returns whether anything
/// widened. Locals missing from one side are kept as-is: on the path that
/// never binds them they cannot be read.
fn merge_into(gs: &GlobalState, existing: &mut Env, incoming: &Env) -> bool {
    let mut changed = false;
    for (local, ty) in incoming {
        match existing.get(local) {
            None => {
                existing.insert(*local, ty.clone());
                changed = true;
            }
            Some(old) => {
                let joined = join(gs, old, ty);
                if joined != *old {
                    existing.insert(*local, joined);
                    changed = true;
                }
            }
        }
    }
    changed
}

/// Run the per-instruction transfer over one block. Returns the outgoing
/// environment per successor edge (with refinements applied on
/// conditionals). When `emit` is set, also writes diagnostics, use-site
/// types, and hover facts.
#[allow(clippy::too_many_arguments)]
fn transfer_block(
    gs: &GlobalState,
    cfg: &mut Cfg,
    id: BlockId,
    mut env: Env,
    self_ty: &Type,
    declared_return: &Type,
    link_results: &mut HashMap<u32, Type>,
    mut emit: Option<&mut InferResult>,
) -> (Option<(BlockId, Env)>, Option<(BlockId, Env)>) {
    let nbindings = cfg.blocks[id.0 as usize].bindings.len();
    for b in 0..nbindings {
        // Read the instruction, compute, then write back use-site types on
        // the emit pass.
        let (ty, site_updates) = {
            let binding = &cfg.blocks[id.0 as usize].bindings[b];
            compute_binding(
                gs,
                cfg.method,
                &binding.instr,
                binding.span,
                &env,
                self_ty,
                declared_return,
                link_results,
                emit.as_deref_mut(),
            )
        };
        if emit.is_some() {
            let binding = &mut cfg.blocks[id.0 as usize].bindings[b];
            apply_site_updates(&mut binding.instr, &site_updates);
            if let Some(out) = emit.as_deref_mut() {
                if !binding.span.is_empty() {
                    out.hover.push((binding.span, ty.clone()));
                }
            }
        }
        let target = cfg.blocks[id.0 as usize].bindings[b].target;
        env.insert(target, ty);
    }

    match cfg.blocks[id.0 as usize].terminator.clone() {
        Terminator::Jump(t) => (Some((t, env)), None),
        Terminator::Cond {
            var,
            then_block,
            else_block,
        } => {
            let (then_facts, else_facts) =
                refine::branch_refinements(gs, cfg.block(id), var, &env);
            let mut then_env = env.clone();
            for (local, ty) in then_facts {
                then_env.insert(local, ty);
            }
            let mut else_env = env;
            for (local, ty) in else_facts {
                else_env.insert(local, ty);
            }
            (
                Some((then_block, then_env)),
                Some((else_block, else_env)),
            )
        }
        Terminator::Exit => (None, None),
    }
}

/// Type of one instruction under `env`, plus the use-site types to write
/// back into it.
#[allow(clippy::too_many_arguments)]
fn compute_binding(
    gs: &GlobalState,
    method: SymbolRef,
    instr: &Instruction,
    span: Span,
    env: &Env,
    self_ty: &Type,
    declared_return: &Type,
    link_results: &mut HashMap<u32, Type>,
    mut emit: Option<&mut InferResult>,
) -> (Type, Vec<Type>) {
    let read = |env: &Env, var: LocalRef| env.get(&var).cloned().unwrap_or(Type::Untyped);
    match instr {
        Instruction::Ident(r) => (read(env, *r), Vec::new()),
        Instruction::Alias(sym) => {
            let s = gs.symbol(*sym);
            let ty = if s.is_class() {
                Type::MetaType(Box::new(Type::Class(*sym)))
            } else if s.is_type_alias() {
                Type::MetaType(Box::new(Type::Alias(*sym)))
            } else {
                s.result_type.clone()
            };
            (ty, Vec::new())
        }
        Instruction::Literal(t) => (t.clone(), Vec::new()),
        Instruction::LoadSelf => (self_ty.clone(), Vec::new()),
        Instruction::LoadArg { index } => {
            let ty = gs
                .symbol(method)
                .arguments
                .get(*index)
                .map(|a| replace_self_type(gs, &a.ty, self_ty))
                .unwrap_or(Type::Untyped);
            (ty, Vec::new())
        }
        Instruction::LoadYieldParams { .. } => (Type::Untyped, Vec::new()),
        Instruction::SolveConstraint { link } => (
            link_results.get(link).cloned().unwrap_or(Type::Untyped),
            Vec::new(),
        ),
        Instruction::Send {
            recv,
            method,
            args,
            link,
            is_private_ok,
            name_span,
        } => {
            let recv_ty = read(env, recv.variable);
            let call_args: Vec<CallArg> = args
                .iter()
                .map(|a| CallArg {
                    keyword: a.keyword.clone(),
                    ty: read(env, a.site.variable),
                    span: a.site.span,
                })
                .collect();
            let mut scratch = Vec::new();
            let r = dispatch_send(
                gs,
                &recv_ty,
                method,
                &call_args,
                *is_private_ok,
                span,
                *name_span,
                &mut scratch,
            );
            if let Some(link) = link {
                link_results.insert(*link, r.return_type.clone());
            }
            if let Some(out) = emit.as_deref_mut() {
                out.errors.extend(scratch);
                if let Some(sym) = r.resolved {
                    out.refs.push((*name_span, sym));
                }
            }
            let mut sites = vec![recv_ty];
            sites.extend(call_args.into_iter().map(|a| a.ty));
            (r.return_type, sites)
        }
        Instruction::Return(site) => {
            let ty = read(env, site.variable);
            if let Some(out) = emit.as_deref_mut() {
                if declared_return.is_void() {
                    let nil = Type::nil();
                    if !ty.is_untyped() && !is_subtype(gs, &ty, &nil) {
                        out.errors.push(SpannedError::new(
                            DiagnosticCode::SBW03003,
                            "returned value in a void method is ignored",
                            site.span,
                        ));
                    }
                } else if !is_subtype(gs, &ty, declared_return) {
                    out.errors.push(SpannedError::new(
                        DiagnosticCode::SBE04004,
                        format!(
                            "expected `{}`, got `{}`",
                            declared_return.show(gs),
                            show_widened(gs, &ty)
                        ),
                        site.span,
                    ));
                }
            }
            (Type::Bottom, vec![ty])
        }
        Instruction::BlockReturn { value, .. } => {
            let ty = read(env, value.variable);
            (Type::Untyped, vec![ty])
        }
        Instruction::Cast { value, ty, kind } => {
            let from = read(env, value.variable);
            let checked = matches!(
                kind,
                crate::cfg::CastKind::Let | crate::cfg::CastKind::AssertType
            );
            if checked && !is_subtype(gs, &from, ty) {
                if let Some(out) = emit.as_deref_mut() {
                    out.errors.push(SpannedError::new(
                        DiagnosticCode::SBE04005,
                        format!(
                            "expected `{}`, got `{}`",
                            ty.show(gs),
                            show_widened(gs, &from)
                        ),
                        value.span,
                    ));
                }
            }
            (ty.clone(), vec![from])
        }
        Instruction::TAbsurd(site) => {
            let ty = read(env, site.variable);
            if !ty.is_bottom() {
                if let Some(out) = emit.as_deref_mut() {
                    out.errors.push(SpannedError::new(
                        DiagnosticCode::SBE04006,
                        format!(
                            "control flow reached `T.absurd` because the type `{}` was not handled",
                            ty.show(gs)
                        ),
                        site.span,
                    ));
                }
            }
            (Type::Bottom, vec![ty])
        }
        Instruction::Unanalyzable | Instruction::NotSupported(_) => (Type::Untyped, Vec::new()),
    }
}

/// Write computed types back into an instruction's use sites, in the order
/// `compute_binding` produced them.
fn apply_site_updates(instr: &mut Instruction, types: &[Type]) {
    match instr {
        Instruction::Send { recv, args, .. } => {
            let mut iter = types.iter();
            if let Some(t) = iter.next() {
                recv.ty = t.clone();
            }
            for (arg, t) in args.iter_mut().zip(iter) {
                arg.site.ty = t.clone();
            }
        }
        Instruction::Return(site)
        | Instruction::TAbsurd(site)
        | Instruction::BlockReturn { value: site, .. } => {
            if let Some(t) = types.first() {
                site.ty = t.clone();
            }
        }
        Instruction::Cast { value, .. } => {
            if let Some(t) = types.first() {
                value.ty = t.clone();
            }
        }
        _ => {}
    }
}

