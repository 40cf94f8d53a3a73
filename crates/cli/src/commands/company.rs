use clap::Args;

use expensa_core::domain::company::NewCompany;
use expensa_core::domain::user::{NewUser, Role};

use crate::commands::{with_store, CommandResult};

#[derive(Debug, Clone, Args)]
pub struct InitArgs {
    #[arg(long, help = "Company display name")]
    pub name: String,
    #[arg(long, help = "Country the company operates from")]
    pub country: String,
    #[arg(long, help = "Base currency code every expense is converted into")]
    pub currency: String,
    #[arg(long, help = "Name of the first admin account")]
    pub admin_name: String,
    #[arg(long, help = "Email of the first admin account")]
    pub admin_email: String,
}

pub fn init(args: InitArgs) -> CommandResult {
    with_store("company init", |store| async move {
        let (company, admin) = store
            .create_company_and_admin(
                NewCompany {
                    name: args.name,
                    country: args.country,
                    base_currency: args.currency,
                },
                NewUser {
                    name: args.admin_name,
                    email: args.admin_email,
                    role: Role::Admin,
                    manager_id: None,
                },
            )
            .await?;
        let message = format!("created company `{}` with admin `{}`", company.name, admin.id);
        Ok((message, serde_json::json!({ "company": company, "admin": admin })))
    })
}

pub fn show() -> CommandResult {
    with_store("company show", |store| async move {
        let company = store.company().await?;
        let message = match &company {
            Some(company) => format!("company `{}` ({})", company.name, company.base_currency),
            None => "no company has been set up".to_string(),
        };
        Ok((message, company))
    })
}
