use super::*;
use pretty_assertions::assert_eq;

fn parse(contents: &str) -> SourceFile {
	SourceFile::parse("test.py", contents).unwrap()
}

#[test]
fn test_classes_include_decorated() {
	let file = parse(
		r#"
import odoo

class A(models.Model):
	pass

@some.decorator
class B(Model):
	pass

def helper():
	class Nested(models.Model):
		pass
"#,
	);
	let names = file.classes().iter().map(|class| class.name()).collect::<Vec<_>>();
	assert_eq!(names, vec!["A", "B"], "only module-level classes are reported");
}

#[test]
fn test_base_shapes() {
	let file = parse(
		r#"
class Foo(Model, models.TransientModel, models.AbstractModel.with_meta(x), object(), metaclass=Meta):
	pass
"#,
	);
	let class = file.classes()[0];
	assert_eq!(
		class.bases(),
		vec![
			BaseShape::Name("Model"),
			BaseShape::Qualified {
				namespace: "models",
				name: "TransientModel"
			},
			BaseShape::QualifiedCall {
				namespace: "models",
				name: "AbstractModel"
			},
			BaseShape::Other,
		]
	);
}

#[test]
fn test_attribute_values() {
	let file = parse(
		r#"
class Foo(models.Model):
	_name = 'foo.bar'
	_description = "Foo " "Bar"
	_inherit = ['mail.thread', # comment
		'mail.activity.mixin', 42]
	_order = f'{x} desc'
	_auto = False
	count: int
	_name = 'foo.final'
"#,
	);
	let class = file.classes()[0];
	assert_eq!(
		class.attribute("_name").map(|attr| attr.value),
		Some(Expr::Str("foo.final".into())),
		"the last assignment wins"
	);
	assert_eq!(
		class.attribute("_description").map(|attr| attr.value),
		Some(Expr::Str("Foo Bar".into()))
	);
	assert_eq!(
		class.attribute("_inherit").map(|attr| attr.value),
		Some(Expr::List(vec![
			Expr::Str("mail.thread".into()),
			Expr::Str("mail.activity.mixin".into()),
			Expr::Other("42"),
		]))
	);
	assert_eq!(
		class.attribute("_order").map(|attr| attr.value),
		Some(Expr::Other("f'{x} desc'")),
		"f-strings are not literals"
	);
	assert_eq!(class.attribute("_auto").map(|attr| attr.value), Some(Expr::Bool(false)));
	assert!(class.attribute("count").is_none(), "annotations without a value are skipped");
}

#[test]
fn test_call_arguments() {
	let file = parse(
		r#"
class Foo(models.Model):
	partner_id = fields.Many2one('res.partner', string="Partner", required=True, domain=[('active', '=', True)], **extra)
"#,
	);
	let class = file.classes()[0];
	let Some(Expr::Call(call)) = class.attribute("partner_id").map(|attr| attr.value) else {
		panic!("expected a call");
	};
	assert_eq!(
		call.callee,
		Callee::Qualified {
			namespace: "fields",
			name: "Many2one"
		}
	);
	assert_eq!(call.positional, vec![Expr::Str("res.partner".into())]);
	assert_eq!(
		call.keywords.iter().map(|kw| kw.name).collect::<Vec<_>>(),
		vec!["string", "required", "domain"]
	);
	assert_eq!(call.keyword("required").map(|kw| kw.value.as_bool()), Some(Some(true)));
	assert_eq!(call.keyword("domain").map(|kw| kw.text), Some("[('active', '=', True)]"));
}

#[test]
fn test_methods() {
	let file = parse(
		r#"
class Foo(models.Model):
	"""  Foo docs.  """

	@api.depends('a', 'b')
	@api.model
	def _compute_total(self, *args, limit: int = 10, **kwargs):
		"""Sum things."""
		pass

	def action_confirm(self, force, /, *, typed: bool):
		pass
"#,
	);
	let class = file.classes()[0];
	assert_eq!(class.docstring().as_deref(), Some("Foo docs."));
	let methods = class.methods();
	assert_eq!(methods.len(), 2);
	assert_eq!(methods[0].name, "_compute_total");
	assert_eq!(methods[0].decorators, vec!["api.depends('a', 'b')", "api.model"]);
	assert_eq!(methods[0].parameters, vec!["self", "*args", "limit", "**kwargs"]);
	assert_eq!(methods[0].docstring.as_deref(), Some("Sum things."));
	assert_eq!(methods[1].name, "action_confirm");
	assert_eq!(methods[1].parameters, vec!["self", "force", "typed"]);
	assert_eq!(methods[1].docstring, None);
}

#[test]
fn test_class_at_roundtrip() {
	let file = parse("class A(Model):\n\tpass\nclass B(Model):\n\tpass\n");
	let classes = file.classes();
	let found = file.class_at(&classes[1].byte_range()).map(|class| class.name());
	assert_eq!(found, Some("B"));
	assert_eq!(classes[1].location().to_string(), "test.py:3:1");
}

#[test]
fn test_broken_source_still_parses() {
	let file = parse("class Foo(models.Model:\n\t_name = 'x'\n");
	// tree-sitter recovers; whatever it yields must not panic.
	for class in file.classes() {
		_ = class.bases();
		_ = class.attributes();
		_ = class.methods();
	}
}
