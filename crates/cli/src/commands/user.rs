use clap::Args;

use expensa_core::domain::user::{NewUser, Role, UserId};

use crate::commands::{with_store, CommandResult};

#[derive(Debug, Clone, Args)]
pub struct AddArgs {
    #[arg(long)]
    pub name: String,
    #[arg(long)]
    pub email: String,
    #[arg(long, default_value = "employee", help = "admin, manager or employee")]
    pub role: Role,
    #[arg(long, help = "Id of the user this one reports to")]
    pub manager: Option<String>,
}

#[derive(Debug, Clone, Args)]
pub struct RoleArgs {
    #[arg(long)]
    pub id: String,
    #[arg(long, help = "admin, manager or employee")]
    pub role: Role,
}

#[derive(Debug, Clone, Args)]
pub struct ManagerArgs {
    #[arg(long)]
    pub id: String,
    #[arg(long, help = "Manager id; omit to clear the reporting line")]
    pub manager: Option<String>,
}

pub fn add(args: AddArgs) -> CommandResult {
    with_store("user add", |store| async move {
        let user = store
            .add_user(NewUser {
                name: args.name,
                email: args.email,
                role: args.role,
                manager_id: args.manager.map(UserId),
            })
            .await?;
        Ok((format!("added {} `{}`", user.role, user.id), user))
    })
}

pub fn role(args: RoleArgs) -> CommandResult {
    with_store("user role", |store| async move {
        let user = store.update_user_role(&UserId(args.id), args.role).await?;
        Ok((format!("user `{}` is now {}", user.id, user.role), user))
    })
}

pub fn manager(args: ManagerArgs) -> CommandResult {
    with_store("user manager", |store| async move {
        let manager_id = args.manager.map(UserId);
        let user = store.set_manager(&UserId(args.id), manager_id.as_ref()).await?;
        let message = match &user.manager_id {
            Some(manager_id) => format!("user `{}` reports to `{manager_id}`", user.id),
            None => format!("user `{}` has no manager", user.id),
        };
        Ok((message, user))
    })
}

pub fn list() -> CommandResult {
    with_store("user list", |store| async move {
        let users = store.users().await?;
        Ok((format!("{} users", users.len()), users))
    })
}
