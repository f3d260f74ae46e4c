use docres::analyzer::{create_analyzer, CodeAnalyzer};
use docres::entity::{strip_line_ending, CodeEntity, EntityKind};
use docres::models::{DocumentPosition, DocumentRange};

const SAMPLE: &str = include_str!("fixtures/python/sample.py");
const BACKENDS: [&str; 2] = ["structural", "symbols"];

struct Expected {
    cursors: &'static [(u32, u32)],
    kind: EntityKind,
    name: &'static str,
    code_lines: &'static [&'static str],
    docstring: Option<((u32, u32), (u32, u32))>,
    indent_level: u32,
    signature_end: (u32, u32),
}

fn named_cases() -> Vec<Expected> {
    vec![
        Expected {
            cursors: &[(2, 10)],
            kind: EntityKind::Class,
            name: "Foo",
            code_lines: &[
                "class Foo:",
                "    def __init__(self): pass",
                "",
                "    def sum(self,",
                "            x: int,",
                "            y: int):",
                "        result = x + y",
                "        return result",
            ],
            docstring: None,
            indent_level: 0,
            signature_end: (2, 10),
        },
        Expected {
            cursors: &[(40, 10)],
            kind: EntityKind::Class,
            name: "newcls",
            code_lines: &[
                "    class newcls:",
                "        def __new__(cls):",
                "            ...",
            ],
            docstring: None,
            indent_level: 1,
            signature_end: (40, 17),
        },
        Expected {
            cursors: &[(3, 5), (3, 28)],
            kind: EntityKind::Function,
            name: "__init__",
            code_lines: &["    def __init__(self): pass"],
            docstring: None,
            indent_level: 1,
            signature_end: (3, 23),
        },
        Expected {
            cursors: &[(5, 5), (7, 20), (9, 15)],
            kind: EntityKind::Function,
            name: "sum",
            code_lines: &[
                "    def sum(self,",
                "            x: int,",
                "            y: int):",
                "        result = x + y",
                "        return result",
            ],
            docstring: None,
            indent_level: 1,
            signature_end: (7, 20),
        },
        Expected {
            cursors: &[(11, 10), (14, 11)],
            kind: EntityKind::Function,
            name: "outer_func",
            code_lines: &[
                "def outer_func():",
                "    def inner_func():",
                "        pass",
                "    return None",
            ],
            docstring: None,
            indent_level: 0,
            signature_end: (11, 17),
        },
        Expected {
            cursors: &[(12, 5), (13, 12)],
            kind: EntityKind::Function,
            name: "inner_func",
            code_lines: &["    def inner_func():", "        pass"],
            docstring: None,
            indent_level: 1,
            signature_end: (12, 21),
        },
        Expected {
            cursors: &[(16, 21), (17, 12), (18, 15)],
            kind: EntityKind::Function,
            name: "with_docstring",
            code_lines: &[
                "def with_docstring():",
                "    \"\"\" docstring \"\"\"",
                "    return None",
            ],
            docstring: Some(((17, 4), (17, 21))),
            indent_level: 0,
            signature_end: (16, 21),
        },
        Expected {
            cursors: &[(20, 16), (22, 7), (25, 4)],
            kind: EntityKind::Function,
            name: "with_multiline_docstring",
            code_lines: &[
                "def with_multiline_docstring():",
                "    \"\"\"",
                "    multiline",
                "    docstring",
                "    \"\"\"",
                "    return None",
            ],
            docstring: Some(((21, 4), (24, 7))),
            indent_level: 0,
            signature_end: (20, 31),
        },
        Expected {
            cursors: &[(27, 13), (28, 15)],
            kind: EntityKind::Function,
            name: "async_func",
            code_lines: &["async def async_func():", "    return None"],
            docstring: None,
            indent_level: 0,
            signature_end: (27, 23),
        },
        Expected {
            cursors: &[(30, 8), (30, 31)],
            kind: EntityKind::Function,
            name: "oneline_func",
            code_lines: &["def oneline_func(): return None"],
            docstring: None,
            indent_level: 0,
            signature_end: (30, 19),
        },
        Expected {
            cursors: &[(32, 12), (32, 34), (33, 6)],
            kind: EntityKind::Function,
            name: "with_ignore_typing",
            code_lines: &["def with_ignore_typing(): # typing: ignore", "    ..."],
            docstring: None,
            indent_level: 0,
            signature_end: (32, 42),
        },
        Expected {
            cursors: &[(35, 12), (36, 12), (37, 7)],
            kind: EntityKind::Function,
            name: "starting_with_comment",
            code_lines: &[
                "def starting_with_comment():",
                "    # some comment",
                "    ...",
            ],
            docstring: None,
            indent_level: 0,
            signature_end: (35, 28),
        },
        Expected {
            cursors: &[(39, 24)],
            kind: EntityKind::Function,
            name: "with_nested_class",
            code_lines: &[
                "def with_nested_class():",
                "    class newcls:",
                "        def __new__(cls):",
                "            ...",
            ],
            docstring: None,
            indent_level: 0,
            signature_end: (39, 24),
        },
    ]
}

const MODULE_CURSORS: &[(u32, u32)] = &[
    (10, 0),
    (15, 0),
    (19, 0),
    (26, 0),
    (29, 0),
    (31, 0),
    (34, 0),
    (38, 0),
    (43, 0),
    (44, 5),
    (45, 8),
];

fn analyzer(name: &str) -> Box<dyn CodeAnalyzer> {
    create_analyzer(name, SAMPLE).expect("analyzer")
}

fn context(analyzer: &dyn CodeAnalyzer, (line, character): (u32, u32)) -> CodeEntity {
    analyzer
        .get_context(DocumentPosition::new(line, character))
        .unwrap_or_else(|err| panic!("context at {line}:{character}: {err}"))
}

fn stripped_lines(entity: &CodeEntity) -> Vec<&str> {
    entity
        .code_lines()
        .into_iter()
        .map(strip_line_ending)
        .collect()
}

#[test]
fn named_entities_match_expected_shape() {
    for backend in BACKENDS {
        let analyzer = analyzer(backend);
        for case in named_cases() {
            for &cursor in case.cursors {
                let entity = context(analyzer.as_ref(), cursor);
                let label = format!("{backend} at {cursor:?}");

                assert_eq!(entity.kind(), case.kind, "{label}");
                assert_eq!(entity.name(), Some(case.name), "{label}");
                assert_eq!(entity.code(), case.code_lines.join("\n"), "{label}");
                assert_eq!(stripped_lines(&entity), case.code_lines, "{label}");
                assert_eq!(entity.code_lines().concat(), entity.code(), "{label}");

                let expected_docstring = case.docstring.map(|(start, end)| {
                    DocumentRange::new(
                        DocumentPosition::new(start.0, start.1),
                        DocumentPosition::new(end.0, end.1),
                    )
                    .expect("range")
                });
                assert_eq!(entity.docstring_range(), expected_docstring, "{label}");

                let named = entity.as_named().expect("named entity");
                assert_eq!(named.indent_level(), case.indent_level, "{label}");
                assert_eq!(
                    named.signature_end(),
                    DocumentPosition::new(case.signature_end.0, case.signature_end.1),
                    "{label}"
                );
                assert_eq!(named.source(), SAMPLE, "{label}");
            }
        }
    }
}

#[test]
fn cursors_outside_definitions_resolve_to_module() {
    for backend in BACKENDS {
        let analyzer = analyzer(backend);
        for &cursor in MODULE_CURSORS {
            let entity = context(analyzer.as_ref(), cursor);
            assert_eq!(entity.kind(), EntityKind::Module, "{backend} at {cursor:?}");
            assert!(entity.docstring_range().is_none());
            assert_eq!(entity.code_lines().len(), 45);
            assert_eq!(entity.code().len(), 669);
            assert_eq!(entity.code(), SAMPLE);
        }
    }
}

#[test]
fn column_zero_inside_class_body_stays_in_class() {
    for backend in BACKENDS {
        let entity = context(analyzer(backend).as_ref(), (4, 0));
        assert_eq!(entity.kind(), EntityKind::Class, "{backend}");
        assert_eq!(entity.name(), Some("Foo"), "{backend}");
    }
}

#[test]
fn enclosing_function_and_class_queries() {
    for backend in BACKENDS {
        let analyzer = analyzer(backend);
        let cursor = DocumentPosition::new(41, 12);

        let context = analyzer.get_context(cursor).expect("context");
        assert_eq!(context.name(), Some("__new__"), "{backend}");

        let class = analyzer.get_class(cursor).expect("ok").expect("class");
        assert_eq!(class.name(), Some("newcls"), "{backend}");

        let function = analyzer.get_function(cursor).expect("ok").expect("function");
        assert_eq!(function.name(), Some("__new__"), "{backend}");

        let module = analyzer.get_module(cursor).expect("module");
        assert_eq!(module.kind(), EntityKind::Module, "{backend}");

        let top = DocumentPosition::new(44, 5);
        assert!(analyzer.get_class(top).expect("ok").is_none(), "{backend}");
        assert!(analyzer.get_function(top).expect("ok").is_none(), "{backend}");
    }
}

#[test]
fn backends_agree_on_every_cursor() {
    let structural = analyzer("structural");
    let symbols = analyzer("symbols");

    for (row, line) in SAMPLE.split_inclusive('\n').enumerate() {
        let line_number = row as u32 + 1;
        let width = strip_line_ending(line).len() as u32;
        for character in 0..=width {
            let cursor = (line_number, character);
            let a = context(structural.as_ref(), cursor);
            let b = context(symbols.as_ref(), cursor);

            assert_eq!(a.kind(), b.kind(), "kind at {cursor:?}");
            assert_eq!(a.name(), b.name(), "name at {cursor:?}");
            assert_eq!(a.code(), b.code(), "code at {cursor:?}");
            assert_eq!(a.docstring_range(), b.docstring_range(), "docstring at {cursor:?}");
            assert_eq!(
                a.as_named().map(|n| n.signature_end()),
                b.as_named().map(|n| n.signature_end()),
                "signature end at {cursor:?}"
            );
        }
    }
}

#[test]
fn backends_agree_on_decorated_and_nested_definitions() {
    let source = "import functools\n\n@functools.cache\nclass Cached:  # cached\n    '''Cached.'''\n\n    @property\n    def value(\n        self,\n    ) -> dict[str, int]:\n        return {'a': 1}\n\n\nasync def fetch(url: str = 'http://x:80'):\n    async with session() as s:\n        return await s.get(url)\n";
    let structural = create_analyzer("structural", source).expect("structural");
    let symbols = create_analyzer("symbols", source).expect("symbols");

    for (row, line) in source.split_inclusive('\n').enumerate() {
        for character in 0..=strip_line_ending(line).len() as u32 {
            let cursor = (row as u32 + 1, character);
            let a = context(structural.as_ref(), cursor);
            let b = context(symbols.as_ref(), cursor);
            assert_eq!(a.name(), b.name(), "name at {cursor:?}");
            assert_eq!(a.code(), b.code(), "code at {cursor:?}");
            assert_eq!(
                a.as_named().map(|n| n.signature_end()),
                b.as_named().map(|n| n.signature_end()),
                "signature end at {cursor:?}"
            );
        }
    }

    let class = context(structural.as_ref(), (5, 6));
    let named = class.as_named().expect("class");
    assert_eq!(named.name(), "Cached");
    assert_eq!(named.signature_end(), DocumentPosition::new(4, 23));
    assert_eq!(named.code_range().start, DocumentPosition::new(4, 0));

    let method = context(symbols.as_ref(), (11, 9));
    let named = method.as_named().expect("method");
    assert_eq!(named.name(), "value");
    assert_eq!(named.signature_end(), DocumentPosition::new(10, 24));

    let fetch = context(symbols.as_ref(), (14, 8));
    assert_eq!(
        fetch.as_named().expect("fetch").signature_end(),
        DocumentPosition::new(14, 42)
    );
}

#[test]
fn syntax_errors_are_reported_by_both_backends() {
    for backend in BACKENDS {
        let err = create_analyzer(backend, "def broken(:\n    pass\n")
            .err()
            .expect("syntax error");
        assert!(
            matches!(err, docres::AnalyzerError::Syntax { line: 1, .. }),
            "{backend}: {err}"
        );
    }
}

#[test]
fn grammar_accepted_invalid_python_is_rejected_by_both_backends() {
    let cases = [
        ("def f():\n    return 1\nprint 'x'\n", 3, 0),
        ("print 'hello'\nexec 'x'\n", 1, 0),
        ("def f():\n        return 1\n    x = 2\n", 3, 4),
    ];
    for backend in BACKENDS {
        for (source, line, column) in cases {
            let err = create_analyzer(backend, source)
                .err()
                .unwrap_or_else(|| panic!("{backend} accepted {source:?}"));
            match err {
                docres::AnalyzerError::Syntax {
                    line: l, column: c, ..
                } => assert_eq!((l, c), (line, column), "{backend}: {source:?}"),
                other => panic!("{backend}: unexpected error {other}"),
            }
        }
    }
}
