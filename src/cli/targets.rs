use crate::Result;
use crate::settings::Settings;
use crate::ui::table::print_table;
use comfy_table::{Cell, ContentArrangement, Table};

/// List registered targets
#[derive(Debug, clap::Args)]
#[clap(
    visible_alias = "ls",
    verbatim_doc_comment,
    long_about = "\
List registered targets

Shows every target in the registry ordered by tenant, with the address
that ends up in the scrape config.

Example:
  promsync targets
  promsync targets --tenant acme

Output:
  Tenant  ID    Name     Address
  acme    api   API      api.acme.com:443
  acme    web   Website  web.acme.com:8080
  zenith  db    -        10.0.0.5:9187  (unparsed)"
)]
pub struct Targets {
    /// Only show targets of this tenant
    #[clap(long, short)]
    tenant: Option<String>,
    /// Hide the table header row
    #[clap(long)]
    hide_header: bool,
}

impl Targets {
    pub async fn run(&self) -> Result<()> {
        let supervisor = super::supervisor(Settings::load()?)?;
        let targets = match &self.tenant {
            Some(tenant) => supervisor.tenant_targets(tenant).await?,
            None => supervisor.targets().await?,
        };

        let mut table = Table::new();
        table
            .load_preset(comfy_table::presets::NOTHING)
            .set_content_arrangement(ContentArrangement::Dynamic);
        if !self.hide_header && console::user_attended() {
            table.set_header(vec!["Tenant", "ID", "Name", "Address", ""]);
        }
        for target in &targets {
            let address = target.address();
            table.add_row(vec![
                Cell::new(&target.tenant_id),
                Cell::new(&target.id),
                Cell::new(if target.display_name.is_empty() {
                    "-"
                } else {
                    target.display_name.as_str()
                }),
                Cell::new(address.as_str()),
                Cell::new(if address.is_fallback() {
                    console::style("(unparsed)").yellow().to_string()
                } else {
                    String::new()
                }),
            ]);
        }

        print_table(table, "no targets registered")
    }
}
