//! Native component registry.
//!
//! Components are static configuration: a name, a rule choosing the concrete
//! tag, and default class/style declarations merged in front of the user's own.
//! Nothing here is derived or inherited at runtime.

use lazy_static::lazy_static;
use std::collections::HashMap;

use crate::attribute::{format_number, AttrValue, Attributes};

// ═══════════════════════════════════════════════════════════════════════════════
// COMPONENT SPECS
// ═══════════════════════════════════════════════════════════════════════════════

/// How a component picks the tag it renders as.
#[derive(Debug, Clone, Copy)]
pub enum TagRule {
    Fixed(&'static str),
    /// Read from the `as` attribute, restricted to `allowed`.
    FromAs {
        default: &'static str,
        allowed: &'static [&'static str],
    },
}

/// An attribute the component turns into a default style declaration.
#[derive(Debug, Clone, Copy)]
pub struct StyleProp {
    pub attr: &'static str,
    pub property: &'static str,
    pub keywords: &'static [(&'static str, &'static str)],
    /// Numbers are emitted as pixel lengths.
    pub px_numbers: bool,
}

#[derive(Debug, Clone)]
pub struct ComponentSpec {
    pub name: &'static str,
    pub tag: TagRule,
    pub default_class: Option<&'static str>,
    pub default_style: &'static [(&'static str, &'static str)],
    pub style_props: &'static [StyleProp],
    /// Set only when the user did not supply them.
    pub default_attrs: &'static [(&'static str, &'static str)],
    /// Read by the compiler and never emitted.
    pub consumed: &'static [&'static str],
    pub void: bool,
}

/// Result of resolving a component against its attributes.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedTag {
    pub tag: String,
    pub void: bool,
}

/// The component whose `src` is handed to the image optimizer.
pub const IMAGE_COMPONENT: &str = "Image";

const HEADINGS: &[&str] = &["h1", "h2", "h3", "h4", "h5", "h6"];

const TEXT_TAGS: &[&str] = &[
    "p",
    "span",
    "small",
    "strong",
    "em",
    "b",
    "i",
    "u",
    "mark",
    "label",
    "blockquote",
    "code",
    "pre",
];

const GAP: StyleProp = StyleProp {
    attr: "gap",
    property: "gap",
    keywords: &[],
    px_numbers: true,
};

const JUSTIFY: StyleProp = StyleProp {
    attr: "justify",
    property: "justify-content",
    keywords: &[
        ("start", "flex-start"),
        ("center", "center"),
        ("end", "flex-end"),
        ("between", "space-between"),
        ("around", "space-around"),
        ("evenly", "space-evenly"),
    ],
    px_numbers: false,
};

const ITEMS: StyleProp = StyleProp {
    attr: "items",
    property: "align-items",
    keywords: &[],
    px_numbers: false,
};

impl ComponentSpec {
    const fn plain(name: &'static str, tag: &'static str) -> Self {
        ComponentSpec {
            name,
            tag: TagRule::Fixed(tag),
            default_class: None,
            default_style: &[],
            style_props: &[],
            default_attrs: &[],
            consumed: &[],
            void: false,
        }
    }

    /// Rewrites `attrs` in place and returns the concrete tag.
    ///
    /// Defaults come first in both `class` and `style`, so user values that
    /// repeat a property win by cascade order.
    pub fn resolve(&self, attrs: &mut Attributes) -> Result<ResolvedTag, String> {
        let tag = match self.tag {
            TagRule::Fixed(tag) => tag.to_string(),
            TagRule::FromAs { default, allowed } => match attrs.remove("as") {
                None => default.to_string(),
                Some(AttrValue::Str(tag)) if allowed.contains(&tag.as_str()) => tag,
                Some(other) => {
                    return Err(format!(
                        "`as=\"{}\"` is not one of: {}",
                        other,
                        allowed.join(", ")
                    ))
                }
            },
        };

        let mut declarations: Vec<(String, String)> = self
            .default_style
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        for prop in self.style_props {
            if let Some(value) = attrs.remove(prop.attr) {
                declarations.push((prop.property.to_string(), style_prop_value(prop, &value)));
            }
        }

        if let Some(default_class) = self.default_class {
            let user = attrs.get("class").map(text_of).unwrap_or_default();
            let merged = format!("{} {}", default_class, user).trim().to_string();
            attrs.set("class", AttrValue::Str(merged));
        }

        if !declarations.is_empty() {
            let defaults = declarations
                .iter()
                .map(|(k, v)| format!("{}:{}", k, v))
                .collect::<Vec<_>>()
                .join(";");
            let user = attrs.get("style").map(text_of).unwrap_or_default();
            let merged = if user.trim().is_empty() {
                defaults
            } else {
                format!("{}; {}", defaults, user.trim())
            };
            attrs.set("style", AttrValue::Str(merged));
        }

        for (name, value) in self.default_attrs {
            if !attrs.contains(name) {
                attrs.set(name, AttrValue::Str(value.to_string()));
            }
        }

        for name in self.consumed {
            attrs.remove(name);
        }

        Ok(ResolvedTag {
            tag,
            void: self.void,
        })
    }
}

fn text_of(value: &AttrValue) -> String {
    match value {
        AttrValue::Bool(true) => String::new(),
        other => other.to_string(),
    }
}

fn style_prop_value(prop: &StyleProp, value: &AttrValue) -> String {
    match value {
        AttrValue::Number(n) if prop.px_numbers => format!("{}px", format_number(*n)),
        other => {
            let text = other.to_string();
            prop.keywords
                .iter()
                .find(|(k, _)| *k == text)
                .map(|(_, v)| v.to_string())
                .unwrap_or(text)
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// REGISTRY
// ═══════════════════════════════════════════════════════════════════════════════

pub struct ComponentRegistry {
    components: HashMap<&'static str, ComponentSpec>,
}

impl ComponentRegistry {
    fn builtin() -> Self {
        let specs = [
            ComponentSpec {
                tag: TagRule::FromAs {
                    default: "h1",
                    allowed: HEADINGS,
                },
                ..ComponentSpec::plain("Title", "h1")
            },
            ComponentSpec {
                tag: TagRule::FromAs {
                    default: "p",
                    allowed: TEXT_TAGS,
                },
                ..ComponentSpec::plain("Text", "p")
            },
            ComponentSpec {
                default_class: Some("center"),
                default_style: &[
                    ("width", "100%"),
                    ("min-height", "100vh"),
                    ("display", "flex"),
                    ("flex-direction", "column"),
                    ("justify-content", "center"),
                    ("align-items", "center"),
                ],
                style_props: &[GAP],
                ..ComponentSpec::plain("Center", "div")
            },
            ComponentSpec {
                default_class: Some("row"),
                default_style: &[("display", "flex")],
                style_props: &[JUSTIFY, ITEMS, GAP],
                ..ComponentSpec::plain("Row", "div")
            },
            ComponentSpec {
                default_class: Some("column"),
                default_style: &[("display", "flex"), ("flex-direction", "column")],
                style_props: &[GAP],
                ..ComponentSpec::plain("Column", "div")
            },
            ComponentSpec {
                consumed: &["quality"],
                void: true,
                ..ComponentSpec::plain(IMAGE_COMPONENT, "img")
            },
            ComponentSpec {
                default_attrs: &[("type", "button")],
                ..ComponentSpec::plain("Button", "button")
            },
            ComponentSpec::plain("Link", "a"),
            ComponentSpec {
                void: true,
                ..ComponentSpec::plain("Input", "input")
            },
        ];

        ComponentRegistry {
            components: specs.into_iter().map(|spec| (spec.name, spec)).collect(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&ComponentSpec> {
        self.components.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.components.contains_key(name)
    }

    pub fn is_void(&self, name: &str) -> bool {
        self.get(name).map(|spec| spec.void).unwrap_or(false)
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.components.keys().copied()
    }
}

lazy_static! {
    static ref REGISTRY: ComponentRegistry = ComponentRegistry::builtin();
}

/// The built-in registry shared by every compile.
pub fn registry() -> &'static ComponentRegistry {
    &REGISTRY
}
