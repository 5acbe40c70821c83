use std::fs;

use pretty_assertions::assert_eq;
use serde_json::json;
use tempfile::TempDir;

use super::*;
use crate::config::CONFIG_FILE;
use crate::inspect::Severity;
use crate::utils::init_for_test;

fn write(root: &Path, relative: &str, contents: &str) -> PathBuf {
	let path = root.join(relative);
	fs::create_dir_all(path.parent().unwrap()).unwrap();
	fs::write(&path, contents).unwrap();
	path
}

fn config() -> Config {
	Config::from_json(json!({
		"index": { "ready_timeout_ms": 2000 },
		"fields": { "wait_ms": 2000 }
	}))
	.unwrap()
}

const THREAD: &str = r#"
class MailThread(models.AbstractModel):
	_name = 'mail.thread'
	_description = 'Email Thread'
	message_ids = fields.One2many('mail.message', 'res_id')
"#;

fn project() -> TempDir {
	let dir = tempfile::tempdir().unwrap();
	let root = dir.path();
	write(root, "addons/mail/__manifest__.py", "{'name': 'Discuss', 'version': '1.0'}\n");
	write(root, "addons/mail/models/thread.py", THREAD);
	write(
		root,
		"addons/mail/models/message.py",
		"class Message(models.Model):\n\t_name = 'mail.message'\n\t_description = 'Message'\n\tbody = fields.Html()\n",
	);
	write(
		root,
		"addons/sale/__manifest__.py",
		"{'name': 'Sales', 'depends': ['mail'], 'auto_install': False}\n",
	);
	write(
		root,
		"addons/sale/models/order.py",
		r#"
class SaleOrder(models.Model):
	_name = 'sale.order'
	_description = 'Sales Order'
	_inherit = ['mail.thread']
	partner_id = fields.Many2one('res.partner', required=True)
	amount = fields.Monetary()

	def action_confirm(self):
		pass

	@api.depends('amount')
	def _compute_total(self):
		pass

class SaleLine(models.Model):
	_name = 'sale.order.line'
	_description = 'Sales Line'
	order_id = fields.Many2one('sale.order')
"#,
	);
	dir
}

fn names<T>(items: &[T], name: impl Fn(&T) -> &str) -> Vec<&str> {
	items.iter().map(name).collect()
}

#[tokio::test]
async fn test_open_and_query() {
	init_for_test();
	let dir = project();
	let workspace = Workspace::open(dir.path(), Some(config())).await;
	assert!(workspace.ready().await);
	assert_eq!(workspace.state(), IndexState::Ready);
	assert!(workspace.is_framework_project().await);

	assert_eq!(
		names(&workspace.all_models().await, |model| model.identifier.as_str()),
		vec!["mail.message", "mail.thread", "sale.order", "sale.order.line"]
	);
	assert_eq!(
		names(&workspace.models_inheriting("mail.thread").await, |model| model.identifier.as_str()),
		vec!["sale.order"]
	);
	assert_eq!(
		workspace.models_with_prefix("sale.").await,
		vec![ImStr::from("sale.order"), ImStr::from("sale.order.line")]
	);
	assert_eq!(
		names(&workspace.mixins().await, |model| model.identifier.as_str()),
		vec!["mail.thread"]
	);

	let fields = workspace.fields_of("sale.order").await;
	assert_eq!(
		names(&fields, |field| field.name.as_str()),
		vec!["partner_id", "amount", "message_ids"]
	);
	let messages = workspace.related_model_of(&fields[2]).await.unwrap();
	assert_eq!(messages.identifier, "mail.message");
	assert!(workspace.related_model_of(&fields[1]).await.is_none());
	assert!(
		workspace.related_model_of(&fields[0]).await.is_none(),
		"res.partner is not part of the workspace"
	);
	let body = workspace.resolve_related("sale.order.line", "order_id.message_ids.body").await;
	assert_eq!(body.map(|field| field.kind), Some(FieldKind::Html));

	let methods = workspace.methods_of("sale.order").await;
	assert_eq!(names(&methods, |method| method.name.as_str()), vec!["action_confirm", "_compute_total"]);

	let module = workspace.module_of("sale.order").await.unwrap();
	assert_eq!(module.name, "sale");
	assert_eq!(module.manifest.display_name.as_deref(), Some("Sales"));
	assert_eq!(module.manifest.depends, vec![ImStr::from("mail")]);
	assert_eq!(names(&workspace.modules().await, |module| module.name.as_str()), vec!["mail", "sale"]);

	workspace.close().await;
}

#[tokio::test]
async fn test_describe() {
	let dir = project();
	let workspace = Workspace::open(dir.path(), Some(config())).await;
	workspace.ready().await;
	let summary = workspace.describe("mail.thread").await.unwrap();
	assert_eq!(summary.field_count, 1);
	assert_eq!(summary.children, vec![ImStr::from("sale.order")]);
	assert_eq!(summary.module.as_deref(), Some("mail"));
	assert_eq!(summary.location.range.start.line, 1);
	assert_eq!(
		summary.to_markdown(),
		"**mail.thread** (mail)\n\nEmail Thread\n\n*Fields (1):*\n- `message_ids`: One2many\n\n*Inherited by:* sale.order"
	);
	assert!(workspace.describe("res.partner").await.is_none());
}

#[tokio::test]
async fn test_describe_truncates() {
	let dir = tempfile::tempdir().unwrap();
	let mut source = String::from("class Big(models.Model):\n\t_name = 'big'\n");
	for idx in 0..12 {
		source.push_str(&format!("\tf{idx} = fields.Char()\n"));
	}
	for idx in 0..7 {
		source.push_str(&format!(
			"class Child{idx}(models.Model):\n\t_name = 'child{idx}'\n\t_inherit = 'big'\n"
		));
	}
	write(dir.path(), "big.py", &source);
	let workspace = Workspace::open(dir.path(), Some(config())).await;
	workspace.ready().await;
	let summary = workspace.describe("big").await.unwrap();
	assert_eq!((summary.fields.len(), summary.field_count), (10, 12));
	assert_eq!((summary.children.len(), summary.child_count), (5, 7));
	assert!(summary.module.is_none());
	let markdown = summary.to_markdown();
	assert!(markdown.contains("- ... and 2 more"), "{markdown}");
	assert!(markdown.ends_with(" and 2 more"), "{markdown}");
}

#[tokio::test]
async fn test_files_changed_invalidates_descendants() {
	init_for_test();
	let dir = project();
	let workspace = Workspace::open(dir.path(), Some(config())).await;
	workspace.ready().await;
	assert_eq!(workspace.fields_of("sale.order").await.len(), 3);

	let thread = write(
		dir.path(),
		"addons/mail/models/thread.py",
		&format!("{THREAD}\tmessage_count = fields.Integer()\n"),
	);
	let changed = workspace
		.files_changed(&[thread, dir.path().join("addons/mail/static/thread.js")])
		.await;
	assert_eq!(changed, HashSet::from([ImStr::from("mail.thread")]));
	assert_eq!(
		names(&workspace.fields_of("sale.order").await, |field| field.name.as_str()),
		vec!["partner_id", "amount", "message_ids", "message_count"]
	);

	let manifest = write(dir.path(), "addons/crm/__manifest__.py", "{'name': 'CRM'}\n");
	assert!(workspace.files_changed(&[manifest]).await.is_empty());
	assert_eq!(names(&workspace.modules().await, |module| module.name.as_str()), vec!["crm", "mail", "sale"]);
}

#[tokio::test]
async fn test_inspect() {
	let dir = project();
	let workspace = Workspace::open(dir.path(), Some(config())).await;
	workspace.ready().await;
	let path = write(
		dir.path(),
		"addons/sale/models/extra.py",
		"class Extra(models.Model):\n\t_name = 'sale.extra'\n\t_inherit = ['mail.thread', 'mail.ghost']\n",
	);
	let diagnostics = workspace.inspect(&path).await.unwrap();
	let summary = diagnostics
		.iter()
		.map(|diag| (diag.severity, diag.message.as_str()))
		.collect::<Vec<_>>();
	assert_eq!(
		summary,
		vec![
			(Severity::WeakWarning, "Model `sale.extra` has no `_description`"),
			(Severity::Error, "Unknown parent model `mail.ghost`"),
		]
	);
	assert!(workspace.inspect(&dir.path().join("missing.py")).await.is_err());
}

#[tokio::test]
async fn test_plain_project() {
	let dir = tempfile::tempdir().unwrap();
	write(dir.path(), "main.py", "class Plain:\n\tpass\n");
	write(dir.path(), CONFIG_FILE, r#"{"index": {"workers": 1}}"#);
	let workspace = Workspace::open(dir.path(), None).await;
	assert_eq!(workspace.settings().workers, 1);
	assert!(!workspace.is_framework_project().await);
	assert!(workspace.all_models().await.is_empty());
	assert!(workspace.fields_of("anything").await.is_empty());
	assert!(workspace.framework_methods().iter().any(|method| method.name == "write"));
	let attributes = workspace.field_attributes(FieldKind::Many2one);
	assert!(attributes.contains(&"required"));
	assert!(attributes.contains(&"comodel_name"));
	assert!(!workspace.field_attributes(FieldKind::Boolean).contains(&"comodel_name"));
}

#[tokio::test]
async fn test_inherited_fields_and_parent_removal() {
	init_for_test();
	let dir = tempfile::tempdir().unwrap();
	write(
		dir.path(),
		"b.py",
		"class B(models.Model):\n\t_name = 'a.b'\n\t_inherit = 'a.c'\n\tfoo = fields.Char()\n",
	);
	let parent = write(
		dir.path(),
		"c.py",
		"class C(models.Model):\n\t_name = 'a.c'\n\tbar = fields.Integer(required=True)\n",
	);
	let workspace = Workspace::open(dir.path(), Some(config())).await;
	assert!(workspace.ready().await);

	let summary = |fields: &[FieldRecord]| {
		fields
			.iter()
			.map(|field| (field.name.to_string(), field.kind, field.required))
			.collect::<Vec<_>>()
	};
	assert_eq!(
		summary(&workspace.fields_of("a.b").await),
		vec![
			("foo".to_string(), FieldKind::Char, false),
			("bar".to_string(), FieldKind::Integer, true),
		]
	);
	assert_eq!(
		names(&workspace.models_inheriting("a.c").await, |model| model.identifier.as_str()),
		vec!["a.b"]
	);

	fs::remove_file(&parent).unwrap();
	let changed = workspace.files_changed(&[parent]).await;
	assert_eq!(changed, HashSet::from([ImStr::from("a.c")]));
	assert_eq!(
		names(&workspace.all_models().await, |model| model.identifier.as_str()),
		vec!["a.b"]
	);
	assert!(workspace.models_inheriting("a.c").await.is_empty());
	let child = workspace.find_model("a.b").await.unwrap();
	assert_eq!(child.parents, vec![ImStr::from("a.c")]);
	assert_eq!(
		summary(&workspace.fields_of("a.b").await),
		vec![("foo".to_string(), FieldKind::Char, false)],
		"the cached list of a.b is dropped along with its parent"
	);
	workspace.close().await;
}

#[tokio::test]
async fn test_manifest_rescan_never_empties_modules() {
	let dir = project();
	let workspace = Workspace::open(dir.path(), Some(config())).await;
	workspace.ready().await;
	let manifest = write(dir.path(), "addons/crm/__manifest__.py", "{'name': 'CRM'}\n");

	let poll = async {
		let mut seen = vec![];
		for _ in 0..20 {
			seen.push(workspace.modules().await.len());
			tokio::task::yield_now().await;
		}
		seen
	};
	let changed = [manifest];
	let (_, seen) = tokio::join!(workspace.files_changed(&changed), poll);
	assert!(seen.iter().all(|count| *count >= 2), "{seen:?}");
	assert_eq!(workspace.modules().await.len(), 3);
}
