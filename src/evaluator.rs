//! The tree-walking evaluator: AST in, [`Value`] tree out.
//!
//! One [`Evaluator`] owns the state of a single evaluation (symbol table,
//! preset table, streaming configuration), while the include cache and
//! cycle-detection set live in an [`IncludeState`] created by the top-level
//! call and threaded by `&mut` through every nested evaluation, so cycles
//! across deep include chains are caught no matter where they close.
//!
//! Scoping is a chain of parent-linked frames: object-literal declarations
//! and `map` iterator bindings each push a frame; lookup is innermost-first,
//! then the top-level symbol table, and an identifier that resolves nowhere
//! evaluates to its own name as a string (which is what makes
//! `name = myToken` mean the string `"myToken"`).
//!
//! Evaluation is fail-fast: the first error aborts, carrying the position of
//! the node that produced it.

use crate::ast::{
    ArrayTemplate, Expression, ObjectLiteral, Pos, Program, Statement, StrPart, ValidatorKind,
};
use crate::error::{EvalError, EvalErrorKind, InvalidMergeMode, ParseError};
use crate::ops;
use crate::parser::Parser;
use crate::ranges;
use crate::streaming::{JsonStreamWriter, RangeIterator, StreamError};
use crate::validators;
use crate::value::Value;
use indexmap::IndexMap;
use std::collections::{HashMap, HashSet};
use std::fmt::Write as _;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// How include-time key collisions are resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MergeMode {
    /// Existing keys in the caller win; the include only fills gaps.
    #[default]
    Keep,
    /// Included keys replace existing ones.
    Overwrite,
    /// Any collision aborts the evaluation.
    Error,
}

impl FromStr for MergeMode {
    type Err = InvalidMergeMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "keep" => Ok(MergeMode::Keep),
            "overwrite" => Ok(MergeMode::Overwrite),
            "error" => Ok(MergeMode::Error),
            other => Err(InvalidMergeMode(other.to_string())),
        }
    }
}

/// Include cache and in-progress set, shared across every evaluator
/// reachable from one top-level evaluation. Cached roots were evaluated
/// under the *included* file's base directory.
#[derive(Debug, Default)]
pub struct IncludeState {
    cache: HashMap<PathBuf, IndexMap<String, Value>>,
    in_progress: HashSet<PathBuf>,
}

/// One lexical scope frame. Lookup walks toward the root.
struct Scope<'a> {
    vars: HashMap<String, Value>,
    parent: Option<&'a Scope<'a>>,
}

impl<'a> Scope<'a> {
    fn child(parent: Option<&'a Scope<'a>>) -> Scope<'a> {
        Scope {
            vars: HashMap::new(),
            parent,
        }
    }

    fn get(&self, name: &str) -> Option<&Value> {
        self.vars
            .get(name)
            .or_else(|| self.parent.and_then(|p| p.get(name)))
    }
}

/// A top-level binding in the streaming path: either already evaluated, or
/// deferred so its items can be emitted without materializing the array.
enum Slot<'p> {
    Done(Value),
    Stream(&'p Expression),
}

pub struct Evaluator<'a> {
    program: &'a Program,
    base_dir: PathBuf,
    merge_mode: MergeMode,
    source_file: Option<PathBuf>,
    source_text: Option<String>,
    symbols: HashMap<String, Value>,
    presets: HashMap<String, ObjectLiteral>,
    streaming_enabled: bool,
    stream_threshold: i64,
    email_seq: u64,
}

impl<'a> Evaluator<'a> {
    #[must_use]
    pub fn new(program: &'a Program, base_dir: impl Into<PathBuf>, merge_mode: MergeMode) -> Self {
        Self {
            program,
            base_dir: base_dir.into(),
            merge_mode,
            source_file: None,
            source_text: None,
            symbols: HashMap::new(),
            presets: HashMap::new(),
            streaming_enabled: false,
            stream_threshold: 10_000,
            email_seq: 0,
        }
    }

    /// Attaches the source path and text, enabling caret renderings on
    /// evaluation errors.
    #[must_use]
    pub fn with_source_file(mut self, path: impl Into<PathBuf>, text: impl Into<String>) -> Self {
        self.source_file = Some(path.into());
        self.source_text = Some(text.into());
        self
    }

    /// Enables or disables streaming output. A non-positive threshold keeps
    /// the previous one.
    pub fn set_streaming(&mut self, enabled: bool, threshold: i64) {
        self.streaming_enabled = enabled;
        if threshold > 0 {
            self.stream_threshold = threshold;
        }
    }

    /// Evaluates the whole program into its root object.
    pub fn evaluate(&mut self) -> Result<Value, EvalError> {
        let mut includes = IncludeState::default();
        self.evaluate_with(&mut includes)
    }

    /// Evaluation sharing an existing include state; used for nested
    /// include resolution.
    fn evaluate_with(&mut self, includes: &mut IncludeState) -> Result<Value, EvalError> {
        let program = self.program;
        let mut root: IndexMap<String, Value> = IndexMap::new();

        for stmt in &program.statements {
            match stmt {
                Statement::VarDecl { name, value, .. } => {
                    let v = self.eval_expression(value, None)?.unwrap_range();
                    self.symbols.insert(name.clone(), v);
                }
                Statement::Preset { name, body, .. } => {
                    // Bodies are stored as AST and re-evaluated per
                    // reference; free identifiers resolve at use site.
                    self.presets.insert(name.clone(), body.clone());
                }
                Statement::Assignment { name, value, .. } => {
                    let v = self.eval_expression(value, None)?.unwrap_range();
                    root.insert(name.clone(), v);
                }
                Statement::Include { path, pos } => {
                    let (abs, inc_root) = self.resolve_include(path, *pos, includes)?;
                    self.merge_root(&mut root, inc_root, &abs, *pos)?;
                }
            }
        }

        Ok(Value::Object(root))
    }

    // === Expressions ===

    fn eval_expression(
        &mut self,
        expr: &Expression,
        ctx: Option<&Scope>,
    ) -> Result<Value, EvalError> {
        match expr {
            Expression::Int { value, .. } => Ok(Value::Int(*value)),
            Expression::Float { value, .. } => Ok(Value::Float(*value)),
            Expression::Bool { value, .. } => Ok(Value::Bool(*value)),
            Expression::Null { .. } => Ok(Value::Null),
            Expression::Str { value, .. } => Ok(Value::String(value.clone())),
            Expression::Ident { name, .. } => Ok(self.eval_identifier(name, ctx)),
            Expression::Validator {
                kind,
                pattern,
                args,
                ..
            } => self.eval_validator(*kind, pattern.as_deref(), args, ctx),
            Expression::Interpolated {
                parts, template, ..
            } => self.eval_interpolated(parts, *template, ctx),
            Expression::Object(obj) => self.eval_object(obj, ctx),
            Expression::Array { elements, .. } => self.eval_array(elements, ctx),
            Expression::ArrayTemplate(template) => self.eval_array_template(template, ctx),
            Expression::Range {
                start,
                end,
                step,
                pos,
            } => self.eval_range(start, end, step.as_deref(), *pos, ctx),
            Expression::MapExpr {
                source,
                param,
                body,
                pos,
            } => self.eval_map(source, param, body, *pos, ctx),
            Expression::Binary {
                op,
                left,
                right,
                pos,
            } => {
                // Both sides evaluate eagerly, `&&`/`||` included.
                let l = self.eval_expression(left, ctx)?;
                let r = self.eval_expression(right, ctx)?;
                ops::eval_binary(&l, *op, &r).map_err(|kind| self.err_at(*pos, kind))
            }
            Expression::Conditional {
                condition,
                consequence,
                alternative,
                ..
            } => {
                let cond = self.eval_expression(condition, ctx)?;
                if ops::is_truthy(&cond) {
                    self.eval_expression(consequence, ctx)
                } else {
                    self.eval_expression(alternative, ctx)
                }
            }
            Expression::Member {
                object,
                property,
                pos,
            } => {
                let left = self.eval_expression(object, ctx)?;
                match left {
                    Value::Object(map) => map.get(property).cloned().ok_or_else(|| {
                        self.err_at(
                            *pos,
                            EvalErrorKind::PropertyNotFound {
                                name: property.clone(),
                            },
                        )
                    }),
                    other => Err(self.err_at(
                        *pos,
                        EvalErrorKind::MemberOnNonObject {
                            found: other.type_name().to_string(),
                        },
                    )),
                }
            }
            Expression::PresetRef {
                name,
                overrides,
                pos,
            } => self.eval_preset_ref(name, overrides.as_ref(), *pos, ctx),
        }
    }

    fn eval_identifier(&mut self, name: &str, ctx: Option<&Scope>) -> Value {
        if let Some(v) = ctx.and_then(|scope| scope.get(name)) {
            return v.clone();
        }
        if let Some(v) = self.symbols.get(name) {
            return v.clone();
        }
        // Unresolved identifiers read as bare-word strings.
        Value::String(name.to_string())
    }

    fn eval_object(&mut self, obj: &ObjectLiteral, ctx: Option<&Scope>) -> Result<Value, EvalError> {
        let mut local = Scope::child(ctx);
        for decl in &obj.declarations {
            let v = self.eval_expression(&decl.value, Some(&local))?.unwrap_range();
            local.vars.insert(decl.name.clone(), v);
        }

        let mut map = IndexMap::new();
        for (key, value_expr) in &obj.properties {
            let Some(expr) = value_expr else { continue };
            let v = self.eval_expression(expr, Some(&local))?.unwrap_range();
            map.insert(key.clone(), v);
        }
        Ok(Value::Object(map))
    }

    fn eval_array(
        &mut self,
        elements: &[Expression],
        ctx: Option<&Scope>,
    ) -> Result<Value, EvalError> {
        let mut out = Vec::with_capacity(elements.len());
        for element in elements {
            match self.eval_expression(element, ctx)? {
                // Ranges splice; ordinary arrays stay nested.
                Value::Range(items) => out.extend(items),
                v => out.push(v),
            }
        }
        Ok(Value::Array(out))
    }

    fn eval_range(
        &mut self,
        start: &Expression,
        end: &Expression,
        step: Option<&Expression>,
        pos: Pos,
        ctx: Option<&Scope>,
    ) -> Result<Value, EvalError> {
        let start_v = self.eval_expression(start, ctx)?;
        let end_v = self.eval_expression(end, ctx)?;
        let step_v = match step {
            Some(expr) => Some(self.eval_expression(expr, ctx)?),
            None => None,
        };
        let step_i = match &step_v {
            None => None,
            Some(Value::Int(i)) => Some(*i),
            Some(other) => {
                return Err(self.err_at(
                    pos,
                    EvalErrorKind::StepNotInteger {
                        step: other.describe(),
                    },
                ))
            }
        };

        match (&start_v, &end_v) {
            (Value::String(s), Value::String(e)) => {
                ranges::string_range(s, e, step_i).map_err(|kind| self.err_at(pos, kind))
            }
            (Value::Int(s), Value::Int(e)) => {
                ranges::integer_range(*s, *e, step_i).map_err(|kind| self.err_at(pos, kind))
            }
            _ => Err(self.err_at(
                pos,
                EvalErrorKind::RangeBoundsNotIntegers {
                    start: start_v.describe(),
                    end: end_v.describe(),
                },
            )),
        }
    }

    fn eval_map(
        &mut self,
        source: &Expression,
        param: &str,
        body: &Expression,
        pos: Pos,
        ctx: Option<&Scope>,
    ) -> Result<Value, EvalError> {
        let items = match self.eval_expression(source, ctx)? {
            Value::Array(items) | Value::Range(items) => items,
            other => {
                return Err(self.err_at(
                    pos,
                    EvalErrorKind::MapTargetNotArray {
                        found: other.type_name().to_string(),
                    },
                ))
            }
        };

        let mut out = Vec::with_capacity(items.len());
        for item in items {
            let mut frame = Scope::child(ctx);
            frame.vars.insert(param.to_string(), item);
            out.push(self.eval_expression(body, Some(&frame))?.unwrap_range());
        }
        Ok(Value::Array(out))
    }

    /// Expands one tabular template. Range cells become parallel columns,
    /// zipped up to the shortest; scalar cells repeat. Implicit templates
    /// (bare `map`) yield the scalar itself instead of a one-key object.
    fn eval_array_template(
        &mut self,
        template: &ArrayTemplate,
        ctx: Option<&Scope>,
    ) -> Result<Value, EvalError> {
        let mut result = Vec::with_capacity(template.rows.len());

        for row in &template.rows {
            let mut cells = Vec::with_capacity(row.len());
            for expr in row {
                cells.push(self.eval_expression(expr, ctx)?);
            }

            let min_parallel = cells
                .iter()
                .filter_map(|cell| match cell {
                    Value::Range(items) => Some(items.len()),
                    _ => None,
                })
                .min();

            match min_parallel {
                Some(n) if n > 0 => {
                    for idx in 0..n {
                        let row_value = build_row_value(template, &cells, Some(idx));
                        result.push(self.apply_map_clause(template, row_value, ctx)?);
                    }
                }
                _ => {
                    let row_value = build_row_value(template, &cells, None);
                    result.push(self.apply_map_clause(template, row_value, ctx)?);
                }
            }
        }

        Ok(Value::Array(result))
    }

    fn apply_map_clause(
        &mut self,
        template: &ArrayTemplate,
        row_value: Value,
        ctx: Option<&Scope>,
    ) -> Result<Value, EvalError> {
        match &template.map {
            Some(clause) => {
                let mut frame = Scope::child(ctx);
                frame.vars.insert(clause.param.clone(), row_value);
                Ok(self
                    .eval_expression(&clause.body, Some(&frame))?
                    .unwrap_range())
            }
            None => Ok(row_value),
        }
    }

    /// Presets re-evaluate their stored body at every reference and return a
    /// fresh copy, so callers can never alias each other. Override keys win.
    fn eval_preset_ref(
        &mut self,
        name: &str,
        overrides: Option<&ObjectLiteral>,
        pos: Pos,
        ctx: Option<&Scope>,
    ) -> Result<Value, EvalError> {
        let Some(body) = self.presets.get(name).cloned() else {
            return Err(self.err_at(
                pos,
                EvalErrorKind::UnknownPreset {
                    name: name.to_string(),
                },
            ));
        };

        let Value::Object(mut map) = self.eval_object(&body, ctx)? else {
            unreachable!("object literals evaluate to objects")
        };

        if let Some(ov) = overrides {
            let Value::Object(ov_map) = self.eval_object(ov, ctx)? else {
                return Err(self.err_at(pos, EvalErrorKind::PresetOverridesNotObject));
            };
            for (k, v) in ov_map {
                map.insert(k, v);
            }
        }

        Ok(Value::Object(map))
    }

    fn eval_interpolated(
        &mut self,
        parts: &[StrPart],
        template: bool,
        ctx: Option<&Scope>,
    ) -> Result<Value, EvalError> {
        let mut out = String::new();
        for part in parts {
            match part {
                StrPart::Text(text) => out.push_str(text),
                StrPart::Expr(expr) => {
                    // An unresolved identifier keeps its placeholder rather
                    // than decaying to a bare-word string.
                    if let Expression::Ident { name, .. } = expr {
                        let resolved = ctx.is_some_and(|s| s.get(name).is_some())
                            || self.symbols.contains_key(name.as_str());
                        if !resolved {
                            if template {
                                let _ = write!(out, "${{{name}}}");
                            } else {
                                let _ = write!(out, "{{{name}}}");
                            }
                            continue;
                        }
                    }
                    let v = self.eval_expression(expr, ctx)?;
                    out.push_str(&v.display_string());
                }
            }
        }
        Ok(Value::String(out))
    }

    fn eval_validator(
        &mut self,
        kind: ValidatorKind,
        pattern: Option<&str>,
        args: &[Expression],
        ctx: Option<&Scope>,
    ) -> Result<Value, EvalError> {
        Ok(match kind {
            ValidatorKind::Uuid => Value::String(validators::uuid_v4()),
            ValidatorKind::Email => {
                let v = validators::email(self.email_seq);
                self.email_seq += 1;
                Value::String(v)
            }
            ValidatorKind::Url => Value::String(validators::url()),
            ValidatorKind::Ipv4 => Value::String(validators::ipv4()),
            ValidatorKind::Ipv6 => Value::String(validators::ipv6()),
            ValidatorKind::Filepath => Value::String(validators::filepath()),
            ValidatorKind::Date => Value::String(validators::date()),
            ValidatorKind::Datetime => Value::String(validators::datetime()),
            ValidatorKind::Regex => Value::String(validators::regex_placeholder(pattern)),
            ValidatorKind::Int => {
                let (min, max) = self.int_args(args, ctx, 0, 100)?;
                Value::Int(validators::random_int(min, max))
            }
            ValidatorKind::Float => {
                let (min, max) = self.float_args(args, ctx, 0.0, 1.0)?;
                Value::Float(validators::random_float(min, max))
            }
            ValidatorKind::Bool => Value::Bool(validators::random_bool()),
        })
    }

    /// `@int(min, max)` arguments; anything that is not an integer falls
    /// back to the defaults.
    fn int_args(
        &mut self,
        args: &[Expression],
        ctx: Option<&Scope>,
        default_min: i64,
        default_max: i64,
    ) -> Result<(i64, i64), EvalError> {
        let mut min = default_min;
        let mut max = default_max;
        if args.len() >= 2 {
            if let Value::Int(v) = self.eval_expression(&args[0], ctx)? {
                min = v;
            }
            if let Value::Int(v) = self.eval_expression(&args[1], ctx)? {
                max = v;
            }
        }
        Ok((min, max))
    }

    fn float_args(
        &mut self,
        args: &[Expression],
        ctx: Option<&Scope>,
        default_min: f64,
        default_max: f64,
    ) -> Result<(f64, f64), EvalError> {
        let mut min = default_min;
        let mut max = default_max;
        if args.len() >= 2 {
            match self.eval_expression(&args[0], ctx)? {
                Value::Int(v) => min = v as f64,
                Value::Float(v) => min = v,
                _ => {}
            }
            match self.eval_expression(&args[1], ctx)? {
                Value::Int(v) => max = v as f64,
                Value::Float(v) => max = v,
                _ => {}
            }
        }
        Ok((min, max))
    }

    // === Includes ===

    /// Resolves and evaluates an included file, returning its absolute path
    /// and root object. Handles the cycle check, the cache, and child
    /// evaluation under the included file's own directory.
    fn resolve_include(
        &mut self,
        path: &str,
        pos: Pos,
        includes: &mut IncludeState,
    ) -> Result<(PathBuf, IndexMap<String, Value>), EvalError> {
        let raw = Path::new(path);
        let joined = if raw.is_absolute() {
            raw.to_path_buf()
        } else {
            self.base_dir.join(raw)
        };
        let abs = joined.canonicalize().unwrap_or(joined);

        if includes.in_progress.contains(&abs) {
            return Err(self.err_at(
                pos,
                EvalErrorKind::CyclicInclude {
                    path: abs.display().to_string(),
                },
            ));
        }

        if let Some(cached) = includes.cache.get(&abs) {
            return Ok((abs, cached.clone()));
        }

        let text = fs::read_to_string(&abs).map_err(|e| {
            self.err_at(
                pos,
                EvalErrorKind::IncludeUnreadable {
                    path: path.to_string(),
                    reason: e.to_string(),
                },
            )
        })?;

        includes.in_progress.insert(abs.clone());

        let mut parser = Parser::new(&text, Some(&abs));
        let program = parser.parse_program();
        if !parser.errors().is_empty() {
            includes.in_progress.remove(&abs);
            let details = parser
                .errors()
                .iter()
                .map(ParseError::render)
                .collect::<Vec<_>>()
                .join("\n");
            return Err(self.err_at(
                pos,
                EvalErrorKind::IncludeParseErrors {
                    path: path.to_string(),
                    details,
                },
            ));
        }

        let base = abs
            .parent()
            .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
        let mut child =
            Evaluator::new(&program, base, self.merge_mode).with_source_file(&abs, text.as_str());

        match child.evaluate_with(includes) {
            Ok(Value::Object(map)) => {
                includes.in_progress.remove(&abs);
                includes.cache.insert(abs.clone(), map.clone());
                Ok((abs, map))
            }
            Ok(_) => unreachable!("program evaluation always yields an object root"),
            Err(inner) => {
                includes.in_progress.remove(&abs);
                Err(self.err_at(
                    pos,
                    EvalErrorKind::IncludeEvalError {
                        path: path.to_string(),
                        source: Box::new(inner),
                    },
                ))
            }
        }
    }

    fn merge_root(
        &self,
        root: &mut IndexMap<String, Value>,
        inc_root: IndexMap<String, Value>,
        abs: &Path,
        pos: Pos,
    ) -> Result<(), EvalError> {
        for (key, value) in inc_root {
            match self.merge_mode {
                MergeMode::Keep => {
                    if !root.contains_key(&key) {
                        root.insert(key, value);
                    }
                }
                MergeMode::Overwrite => {
                    root.insert(key, value);
                }
                MergeMode::Error => {
                    if root.contains_key(&key) {
                        return Err(self.err_at(
                            pos,
                            EvalErrorKind::IncludeMergeConflict {
                                key,
                                path: abs.display().to_string(),
                            },
                        ));
                    }
                    root.insert(key, value);
                }
            }
        }
        Ok(())
    }

    // === Streaming ===

    /// Writes the evaluated root as pretty JSON, emitting qualifying
    /// top-level ranges and maps-over-ranges item by item instead of
    /// materializing them. Output is byte-identical to serializing
    /// [`Evaluator::evaluate`]'s result.
    pub fn transpile_json_streaming<W: io::Write>(
        &mut self,
        out: &mut W,
    ) -> Result<(), StreamError> {
        let program = self.program;
        let mut includes = IncludeState::default();
        let mut root: IndexMap<String, Slot<'a>> = IndexMap::new();

        for stmt in &program.statements {
            match stmt {
                Statement::VarDecl { name, value, .. } => {
                    let v = self.eval_expression(value, None)?.unwrap_range();
                    self.symbols.insert(name.clone(), v);
                }
                Statement::Preset { name, body, .. } => {
                    self.presets.insert(name.clone(), body.clone());
                }
                Statement::Assignment { name, value, .. } => {
                    if self.should_stream(value) {
                        root.insert(name.clone(), Slot::Stream(value));
                    } else {
                        let v = self.eval_expression(value, None)?.unwrap_range();
                        root.insert(name.clone(), Slot::Done(v));
                    }
                }
                Statement::Include { path, pos } => {
                    let (abs, inc_root) = self.resolve_include(path, *pos, &mut includes)?;
                    for (key, value) in inc_root {
                        match self.merge_mode {
                            MergeMode::Keep => {
                                if !root.contains_key(&key) {
                                    root.insert(key, Slot::Done(value));
                                }
                            }
                            MergeMode::Overwrite => {
                                root.insert(key, Slot::Done(value));
                            }
                            MergeMode::Error => {
                                if root.contains_key(&key) {
                                    return Err(self
                                        .err_at(
                                            *pos,
                                            EvalErrorKind::IncludeMergeConflict {
                                                key,
                                                path: abs.display().to_string(),
                                            },
                                        )
                                        .into());
                                }
                                root.insert(key, Slot::Done(value));
                            }
                        }
                    }
                }
            }
        }

        let mut writer = JsonStreamWriter::new(out);
        writer.write_object_start()?;
        for (key, slot) in root {
            writer.write_object_key(&key)?;
            match slot {
                Slot::Done(value) => writer.write_object_value(&value)?,
                Slot::Stream(expr) => self.stream_expression(expr, &mut writer)?,
            }
        }
        writer.write_object_end()?;
        writer.flush()?;
        Ok(())
    }

    /// A top-level binding streams when it is a range above the threshold, a
    /// map over such a range, or a nested map.
    fn should_stream(&mut self, expr: &Expression) -> bool {
        if !self.streaming_enabled {
            return false;
        }
        match expr {
            Expression::Range { start, end, step, .. } => {
                match self.try_int_bounds(start, end, step.as_deref()) {
                    Ok(Some((s, e, st))) => RangeIterator::new(s, e, st).size() > self.stream_threshold,
                    _ => false,
                }
            }
            Expression::MapExpr { source, body, .. } => {
                matches!(body.as_ref(), Expression::MapExpr { .. }) || self.should_stream(source)
            }
            _ => false,
        }
    }

    /// Constant-folds integer range bounds. `Ok(None)` means "not a plain
    /// integer range" and callers fall back to full materialization (which
    /// also reports the proper error for bad steps or bounds).
    fn try_int_bounds(
        &mut self,
        start: &Expression,
        end: &Expression,
        step: Option<&Expression>,
    ) -> Result<Option<(i64, i64, i64)>, EvalError> {
        let Value::Int(s) = self.eval_expression(start, None)? else {
            return Ok(None);
        };
        let Value::Int(e) = self.eval_expression(end, None)? else {
            return Ok(None);
        };
        let st = match step {
            None => {
                if s > e {
                    -1
                } else {
                    1
                }
            }
            Some(expr) => match self.eval_expression(expr, None)? {
                Value::Int(0) => return Ok(None),
                Value::Int(i) => i,
                _ => return Ok(None),
            },
        };
        Ok(Some((s, e, st)))
    }

    fn stream_expression<W: io::Write>(
        &mut self,
        expr: &Expression,
        writer: &mut JsonStreamWriter<W>,
    ) -> Result<(), StreamError> {
        match expr {
            Expression::Range { start, end, step, .. } => {
                if let Some((s, e, st)) = self.try_int_bounds(start, end, step.as_deref())? {
                    writer.write_array_start()?;
                    for i in RangeIterator::new(s, e, st) {
                        writer.write_array_item(&Value::Int(i))?;
                    }
                    writer.write_array_end()?;
                    return Ok(());
                }
            }
            Expression::MapExpr {
                source,
                param,
                body,
                ..
            } => {
                if let Expression::Range { start, end, step, .. } = source.as_ref() {
                    if let Some((s, e, st)) = self.try_int_bounds(start, end, step.as_deref())? {
                        writer.write_array_start()?;
                        for i in RangeIterator::new(s, e, st) {
                            let mut frame = Scope::child(None);
                            frame.vars.insert(param.clone(), Value::Int(i));
                            let v = self
                                .eval_expression(body, Some(&frame))?
                                .unwrap_range();
                            writer.write_array_item(&v)?;
                        }
                        writer.write_array_end()?;
                        return Ok(());
                    }
                }
            }
            _ => {}
        }

        // Not streamable after all; materialize and write as one value.
        let v = self.eval_expression(expr, None)?.unwrap_range();
        writer.write_object_value(&v)?;
        Ok(())
    }

    fn err_at(&self, pos: Pos, kind: EvalErrorKind) -> EvalError {
        EvalError {
            kind,
            line: pos.line,
            column: pos.column,
            file: self.source_file.clone(),
            source_line: self
                .source_text
                .as_deref()
                .and_then(|s| crate::utils::line_text(s, pos.line))
                .map(str::to_string),
        }
    }
}

/// Assembles one output row from evaluated cells. `parallel_idx` selects the
/// element of each range cell during zipping; scalar cells repeat. Extra
/// cells beyond the template's keys are ignored and missing cells leave
/// their key absent.
fn build_row_value(template: &ArrayTemplate, cells: &[Value], parallel_idx: Option<usize>) -> Value {
    let pick = |cell: &Value| match (parallel_idx, cell) {
        (Some(idx), Value::Range(items)) => items.get(idx).cloned().unwrap_or(Value::Null),
        (None, Value::Range(items)) => Value::Array(items.clone()),
        (_, v) => v.clone(),
    };

    if template.implicit {
        return cells.first().map_or(Value::Null, pick);
    }

    let mut obj = IndexMap::new();
    for (i, cell) in cells.iter().enumerate() {
        let Some(key) = template.keys.get(i) else {
            break;
        };
        obj.insert(key.clone(), pick(cell));
    }
    Value::Object(obj)
}
