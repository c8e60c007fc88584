use crate::global_state::GlobalState;
use crate::symbols::Symbols;
use crate::types::{LiteralValue, Type};

/// User-facing rendering, matching the surface syntax the type would be
/// written in.
pub fn show(ty: &Type, gs: &GlobalState) -> String {
    match ty {
        Type::Untyped => "T.untyped".to_string(),
        Type::Top => "T.anything".to_string(),
        Type::Bottom => "T.noreturn".to_string(),
        Type::Class(s) if *s == Symbols::VOID => "void".to_string(),
        Type::Class(s) => gs.symbol_name_str(*s),
        Type::Applied { class, args } => {
            let rendered: Vec<String> = args.iter().map(|a| show(a, gs)).collect();
            format!("{}[{}]", gs.symbol_name_str(*class), rendered.join(", "))
        }
        Type::Literal(lit) => show_literal(lit, gs),
        Type::Tuple(elems) => {
            let rendered: Vec<String> = elems.iter().map(|e| show(e, gs)).collect();
            format!("[{}]", rendered.join(", "))
        }
        Type::Shape { keys, values } => {
            let rendered: Vec<String> = keys
                .iter()
                .zip(values.iter())
                .map(|(k, v)| format!("{}: {}", show_shape_key(k, gs), show(v, gs)))
                .collect();
            format!("{{{}}}", rendered.join(", "))
        }
        Type::Or(..) => {
            let comps = ty.or_components();
            // Prefer the `T.nilable` spelling when nil is one arm.
            let nil = Type::nil();
            if comps.len() == 2 && comps.contains(&nil) {
                let other = comps.iter().find(|c| **c != nil).unwrap();
                return format!("T.nilable({})", show(other, gs));
            }
            let rendered: Vec<String> = comps.iter().map(|c| show(c, gs)).collect();
            format!("T.any({})", rendered.join(", "))
        }
        Type::And(..) => {
            let comps = ty.and_components();
            let rendered: Vec<String> = comps.iter().map(|c| show(c, gs)).collect();
            format!("T.all({})", rendered.join(", "))
        }
        Type::SelfType => "T.self_type".to_string(),
        Type::TypeVar(id) => format!("T.type_parameter(:{})", gs.type_var_name_str(*id)),
        Type::MetaType(inner) => format!("T.class_of({})", show(inner, gs)),
        Type::Alias(sym) => gs.symbol_name_str(*sym),
    }
}

fn show_literal(lit: &LiteralValue, gs: &GlobalState) -> String {
    match lit {
        LiteralValue::Integer(v) => format!("Integer({})", v),
        LiteralValue::Float(bits) => format!("Float({})", f64::from_bits(*bits)),
        LiteralValue::Str(n) => format!("String(\"{}\")", gs.name_str(*n)),
        LiteralValue::Sym(n) => format!("Symbol(:{})", gs.name_str(*n)),
        LiteralValue::Bool(b) => {
            if *b {
                "TrueClass".to_string()
            } else {
                "FalseClass".to_string()
            }
        }
    }
}

fn show_shape_key(key: &LiteralValue, gs: &GlobalState) -> String {
    match key {
        LiteralValue::Sym(n) => gs.name_str(*n),
        LiteralValue::Str(n) => format!("\"{}\"", gs.name_str(*n)),
        other => show_literal(other, gs),
    }
}
