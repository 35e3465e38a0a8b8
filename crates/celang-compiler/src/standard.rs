//! Standard environment: the built-in function and type declarations.
//!
//! Built once behind a `LazyLock` and shared read-only afterwards. Overload
//! ids follow the cel-spec naming (`add_int64`, `less_string`,
//! `timestamp_to_year`, ...) so runtime bindings can be registered by id.

use std::sync::LazyLock;

use celang_core::types::CelType;

use crate::decls::{FunctionDecl, OverloadDecl, VariableDecl};

fn func(name: &str, overloads: Vec<OverloadDecl>) -> FunctionDecl {
    FunctionDecl {
        name: name.to_owned(),
        overloads,
    }
}

fn global(id: &str, params: Vec<CelType>, result: CelType) -> OverloadDecl {
    OverloadDecl::global(id, params, result)
}

fn member(id: &str, params: Vec<CelType>, result: CelType) -> OverloadDecl {
    OverloadDecl::member(id, params, result)
}

fn param_a() -> CelType {
    CelType::param("A")
}

fn param_b() -> CelType {
    CelType::param("B")
}

/// All standard function declarations.
pub fn declarations() -> &'static [FunctionDecl] {
    static DECLS: LazyLock<Vec<FunctionDecl>> = LazyLock::new(build_declarations);
    &DECLS
}

/// Standard identifiers naming types (`int`, `string`, `list`, ...).
pub fn type_variables() -> &'static [VariableDecl] {
    static VARS: LazyLock<Vec<VariableDecl>> = LazyLock::new(|| {
        vec![
            VariableDecl::new("bool", CelType::type_of(CelType::Bool)),
            VariableDecl::new("int", CelType::type_of(CelType::Int)),
            VariableDecl::new("uint", CelType::type_of(CelType::Uint)),
            VariableDecl::new("double", CelType::type_of(CelType::Double)),
            VariableDecl::new("string", CelType::type_of(CelType::String)),
            VariableDecl::new("bytes", CelType::type_of(CelType::Bytes)),
            VariableDecl::new("list", CelType::type_of(CelType::list(CelType::Dyn))),
            VariableDecl::new(
                "map",
                CelType::type_of(CelType::map(CelType::Dyn, CelType::Dyn)),
            ),
            VariableDecl::new("null_type", CelType::type_of(CelType::Null)),
            VariableDecl::new("type", CelType::Type(None)),
            VariableDecl::new("dyn", CelType::type_of(CelType::Dyn)),
        ]
    });
    &VARS
}

fn build_declarations() -> Vec<FunctionDecl> {
    use CelType::{Bool, Bytes, Double, Duration, Dyn, Int, String, Timestamp, Uint};

    let mut decls = Vec::new();

    // Logical operators. `&&`, `||`, `?:` and `@not_strictly_false` get
    // lazy runtime bindings; their declared shapes are ordinary.
    decls.push(func(
        "_&&_",
        vec![global("logical_and", vec![Bool, Bool], Bool)],
    ));
    decls.push(func(
        "_||_",
        vec![global("logical_or", vec![Bool, Bool], Bool)],
    ));
    decls.push(func("!_", vec![global("logical_not", vec![Bool], Bool)]));
    decls.push(func(
        "_?_:_",
        vec![global(
            "conditional",
            vec![Bool, param_a(), param_a()],
            param_a(),
        )],
    ));
    decls.push(func(
        "@not_strictly_false",
        vec![global("not_strictly_false", vec![Bool], Bool)],
    ));

    // Equality is declared over a single type parameter; cross-numeric
    // equality comes in with the heterogeneous comparison flag.
    decls.push(func(
        "_==_",
        vec![global("equals", vec![param_a(), param_a()], Bool)],
    ));
    decls.push(func(
        "_!=_",
        vec![global("not_equals", vec![param_a(), param_a()], Bool)],
    ));

    // Ordering relations over each comparable type.
    let comparable: [(&str, CelType); 8] = [
        ("int64", Int),
        ("uint64", Uint),
        ("double", Double),
        ("string", String),
        ("bytes", Bytes),
        ("bool", Bool),
        ("timestamp", Timestamp),
        ("duration", Duration),
    ];
    for (op, prefix) in [
        ("_<_", "less"),
        ("_<=_", "less_equals"),
        ("_>_", "greater"),
        ("_>=_", "greater_equals"),
    ] {
        let overloads = comparable
            .iter()
            .map(|(suffix, ty)| {
                global(
                    &format!("{prefix}_{suffix}"),
                    vec![ty.clone(), ty.clone()],
                    Bool,
                )
            })
            .collect();
        decls.push(func(op, overloads));
    }

    // Arithmetic.
    decls.push(func(
        "_+_",
        vec![
            global("add_int64", vec![Int, Int], Int),
            global("add_uint64", vec![Uint, Uint], Uint),
            global("add_double", vec![Double, Double], Double),
            global("add_string", vec![String, String], String),
            global("add_bytes", vec![Bytes, Bytes], Bytes),
            global(
                "add_list",
                vec![CelType::list(param_a()), CelType::list(param_a())],
                CelType::list(param_a()),
            ),
            global(
                "add_timestamp_duration",
                vec![Timestamp, Duration],
                Timestamp,
            ),
            global(
                "add_duration_timestamp",
                vec![Duration, Timestamp],
                Timestamp,
            ),
            global("add_duration_duration", vec![Duration, Duration], Duration),
        ],
    ));
    decls.push(func(
        "_-_",
        vec![
            global("subtract_int64", vec![Int, Int], Int),
            global("subtract_uint64", vec![Uint, Uint], Uint),
            global("subtract_double", vec![Double, Double], Double),
            global(
                "subtract_timestamp_timestamp",
                vec![Timestamp, Timestamp],
                Duration,
            ),
            global(
                "subtract_timestamp_duration",
                vec![Timestamp, Duration],
                Timestamp,
            ),
            global(
                "subtract_duration_duration",
                vec![Duration, Duration],
                Duration,
            ),
        ],
    ));
    decls.push(func(
        "_*_",
        vec![
            global("multiply_int64", vec![Int, Int], Int),
            global("multiply_uint64", vec![Uint, Uint], Uint),
            global("multiply_double", vec![Double, Double], Double),
        ],
    ));
    decls.push(func(
        "_/_",
        vec![
            global("divide_int64", vec![Int, Int], Int),
            global("divide_uint64", vec![Uint, Uint], Uint),
            global("divide_double", vec![Double, Double], Double),
        ],
    ));
    decls.push(func(
        "_%_",
        vec![
            global("modulo_int64", vec![Int, Int], Int),
            global("modulo_uint64", vec![Uint, Uint], Uint),
        ],
    ));
    decls.push(func(
        "-_",
        vec![
            global("negate_int64", vec![Int], Int),
            global("negate_double", vec![Double], Double),
        ],
    ));

    // Indexing and membership.
    decls.push(func(
        "_[_]",
        vec![
            global("index_list", vec![CelType::list(param_a()), Int], param_a()),
            global(
                "index_map",
                vec![CelType::map(param_a(), param_b()), param_a()],
                param_b(),
            ),
        ],
    ));
    decls.push(func(
        "_[?_]",
        vec![
            global(
                "optional_index_list",
                vec![CelType::list(param_a()), Int],
                CelType::optional(param_a()),
            ),
            global(
                "optional_index_map",
                vec![CelType::map(param_a(), param_b()), param_a()],
                CelType::optional(param_b()),
            ),
        ],
    ));
    decls.push(func(
        "@in",
        vec![
            global("in_list", vec![param_a(), CelType::list(param_a())], Bool),
            global(
                "in_map",
                vec![param_a(), CelType::map(param_a(), param_b())],
                Bool,
            ),
        ],
    ));

    // size, global and method form.
    decls.push(func(
        "size",
        vec![
            global("size_string", vec![String], Int),
            global("size_bytes", vec![Bytes], Int),
            global("size_list", vec![CelType::list(param_a())], Int),
            global("size_map", vec![CelType::map(param_a(), param_b())], Int),
            member("string_size", vec![String], Int),
            member("bytes_size", vec![Bytes], Int),
            member("list_size", vec![CelType::list(param_a())], Int),
            member("map_size", vec![CelType::map(param_a(), param_b())], Int),
        ],
    ));

    // String predicates.
    decls.push(func(
        "contains",
        vec![member("contains_string", vec![String, String], Bool)],
    ));
    decls.push(func(
        "startsWith",
        vec![member("starts_with_string", vec![String, String], Bool)],
    ));
    decls.push(func(
        "endsWith",
        vec![member("ends_with_string", vec![String, String], Bool)],
    ));
    decls.push(func(
        "matches",
        vec![
            global("matches", vec![String, String], Bool),
            member("matches_string", vec![String, String], Bool),
        ],
    ));

    // Type conversions.
    decls.push(func(
        "int",
        vec![
            global("int64_to_int64", vec![Int], Int),
            global("uint64_to_int64", vec![Uint], Int),
            global("double_to_int64", vec![Double], Int),
            global("string_to_int64", vec![String], Int),
            global("timestamp_to_int64", vec![Timestamp], Int),
            global("duration_to_int64", vec![Duration], Int),
        ],
    ));
    decls.push(func(
        "uint",
        vec![
            global("uint64_to_uint64", vec![Uint], Uint),
            global("int64_to_uint64", vec![Int], Uint),
            global("double_to_uint64", vec![Double], Uint),
            global("string_to_uint64", vec![String], Uint),
        ],
    ));
    decls.push(func(
        "double",
        vec![
            global("double_to_double", vec![Double], Double),
            global("int64_to_double", vec![Int], Double),
            global("uint64_to_double", vec![Uint], Double),
            global("string_to_double", vec![String], Double),
        ],
    ));
    decls.push(func(
        "string",
        vec![
            global("string_to_string", vec![String], String),
            global("int64_to_string", vec![Int], String),
            global("uint64_to_string", vec![Uint], String),
            global("double_to_string", vec![Double], String),
            global("bool_to_string", vec![Bool], String),
            global("bytes_to_string", vec![Bytes], String),
            global("timestamp_to_string", vec![Timestamp], String),
            global("duration_to_string", vec![Duration], String),
        ],
    ));
    decls.push(func(
        "bytes",
        vec![
            global("bytes_to_bytes", vec![Bytes], Bytes),
            global("string_to_bytes", vec![String], Bytes),
        ],
    ));
    decls.push(func(
        "bool",
        vec![
            global("bool_to_bool", vec![Bool], Bool),
            global("string_to_bool", vec![String], Bool),
        ],
    ));
    decls.push(func(
        "timestamp",
        vec![
            global("string_to_timestamp", vec![String], Timestamp),
            global("timestamp_to_timestamp", vec![Timestamp], Timestamp),
        ],
    ));
    decls.push(func(
        "duration",
        vec![
            global("string_to_duration", vec![String], Duration),
            global("duration_to_duration", vec![Duration], Duration),
        ],
    ));
    decls.push(func("dyn", vec![global("to_dyn", vec![param_a()], Dyn)]));
    decls.push(func(
        "type",
        vec![global(
            "type",
            vec![param_a()],
            CelType::type_of(param_a()),
        )],
    ));

    // Timestamp and duration accessors, with optional time-zone argument.
    let ts_accessors: [(&str, &str); 6] = [
        ("getFullYear", "timestamp_to_year"),
        ("getMonth", "timestamp_to_month"),
        ("getDayOfYear", "timestamp_to_day_of_year"),
        ("getDayOfMonth", "timestamp_to_day_of_month"),
        ("getDate", "timestamp_to_day_of_month_1_based"),
        ("getDayOfWeek", "timestamp_to_day_of_week"),
    ];
    for (name, id) in ts_accessors {
        decls.push(func(
            name,
            vec![
                member(id, vec![Timestamp], Int),
                member(&format!("{id}_with_tz"), vec![Timestamp, String], Int),
            ],
        ));
    }
    let time_accessors: [(&str, &str, &str); 4] = [
        ("getHours", "timestamp_to_hours", "duration_to_hours"),
        ("getMinutes", "timestamp_to_minutes", "duration_to_minutes"),
        ("getSeconds", "timestamp_to_seconds", "duration_to_seconds"),
        (
            "getMilliseconds",
            "timestamp_to_milliseconds",
            "duration_to_milliseconds",
        ),
    ];
    for (name, ts_id, dur_id) in time_accessors {
        decls.push(func(
            name,
            vec![
                member(ts_id, vec![Timestamp], Int),
                member(&format!("{ts_id}_with_tz"), vec![Timestamp, String], Int),
                member(dur_id, vec![Duration], Int),
            ],
        ));
    }

    // Optional API.
    decls.push(func(
        "optional.of",
        vec![global(
            "optional_of",
            vec![param_a()],
            CelType::optional(param_a()),
        )],
    ));
    decls.push(func(
        "optional.ofNonZeroValue",
        vec![global(
            "optional_of_non_zero_value",
            vec![param_a()],
            CelType::optional(param_a()),
        )],
    ));
    decls.push(func(
        "optional.none",
        vec![global("optional_none", vec![], CelType::optional(Dyn))],
    ));
    decls.push(func(
        "orValue",
        vec![member(
            "optional_or_value",
            vec![CelType::optional(param_a()), param_a()],
            param_a(),
        )],
    ));
    decls.push(func(
        "or",
        vec![member(
            "optional_or_optional",
            vec![CelType::optional(param_a()), CelType::optional(param_a())],
            CelType::optional(param_a()),
        )],
    ));
    decls.push(func(
        "hasValue",
        vec![member(
            "optional_has_value",
            vec![CelType::optional(param_a())],
            Bool,
        )],
    ));
    decls.push(func(
        "value",
        vec![member(
            "optional_value",
            vec![CelType::optional(param_a())],
            param_a(),
        )],
    ));

    decls
}

/// Cross-numeric ordering overloads, added when heterogeneous numeric
/// comparisons are enabled.
pub fn heterogeneous_comparison_decls() -> Vec<FunctionDecl> {
    use CelType::{Bool, Double, Int, Uint};

    let pairs: [(&str, CelType, CelType); 6] = [
        ("int64_uint64", Int, Uint),
        ("int64_double", Int, Double),
        ("uint64_int64", Uint, Int),
        ("uint64_double", Uint, Double),
        ("double_int64", Double, Int),
        ("double_uint64", Double, Uint),
    ];

    [
        ("_<_", "less"),
        ("_<=_", "less_equals"),
        ("_>_", "greater"),
        ("_>=_", "greater_equals"),
        ("_==_", "equals"),
        ("_!=_", "not_equals"),
    ]
    .into_iter()
    .map(|(op, prefix)| {
        let overloads = pairs
            .iter()
            .map(|(suffix, lhs, rhs)| {
                global(
                    &format!("{prefix}_{suffix}"),
                    vec![lhs.clone(), rhs.clone()],
                    Bool,
                )
            })
            .collect();
        func(op, overloads)
    })
    .collect()
}

/// The numeric `timestamp()` overload (epoch seconds), present unless the
/// legacy string-only behaviour is selected.
pub fn timestamp_epoch_decl() -> FunctionDecl {
    func(
        "timestamp",
        vec![global(
            "int64_to_timestamp",
            vec![CelType::Int],
            CelType::Timestamp,
        )],
    )
}
