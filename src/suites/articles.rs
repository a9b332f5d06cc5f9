//! Black-box checks of the `/articles` collection.

use super::{Resource, ServiceContext, create_then_delete, delete_unknown, list_has_titles};
use crate::error::Error;
use crate::suite::{BoxFuture, Group, Suite};

pub const ARTICLES: Resource = Resource {
    collection: "/articles",
    entity: "article",
    label: "Article",
    id_field: "article_id",
    fixture: "article.json",
    missing_id: "123456",
};

pub fn suite() -> Suite<ServiceContext> {
    Suite::new("articles")
        .case("get_articles_list", Group::Read, get_articles_list)
        .case("create_and_delete_article", Group::Write, create_and_delete_article)
        .case("delete_non_existing_article", Group::Write, delete_non_existing_article)
}

fn get_articles_list(ctx: &ServiceContext) -> BoxFuture<'_, Result<(), Error>> {
    Box::pin(list_has_titles(ctx, &ARTICLES))
}

fn create_and_delete_article(ctx: &ServiceContext) -> BoxFuture<'_, Result<(), Error>> {
    Box::pin(create_then_delete(ctx, &ARTICLES))
}

fn delete_non_existing_article(ctx: &ServiceContext) -> BoxFuture<'_, Result<(), Error>> {
    Box::pin(delete_unknown(ctx, &ARTICLES))
}
