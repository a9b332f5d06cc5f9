//! Black-box checks of the `/books` collection.

use super::{
    Resource, ServiceContext, create_then_delete, delete_unknown, list_has_several_titles,
    list_matches_schema,
};
use crate::error::Error;
use crate::suite::{BoxFuture, Group, Suite};

pub const BOOKS: Resource = Resource {
    collection: "/books",
    entity: "book",
    label: "Book",
    id_field: "book_id",
    fixture: "book.json",
    missing_id: "456123",
};

pub const BOOKS_SCHEMA: &str = "booksSchema.json";

pub fn suite() -> Suite<ServiceContext> {
    Suite::new("books")
        .case("get_books_list", Group::Read, get_books_list)
        .case("books_schema_is_valid", Group::Read, books_schema_is_valid)
        .case("create_and_delete_book", Group::Write, create_and_delete_book)
        .case("delete_non_existing_book", Group::Write, delete_non_existing_book)
}

fn get_books_list(ctx: &ServiceContext) -> BoxFuture<'_, Result<(), Error>> {
    Box::pin(list_has_several_titles(ctx, &BOOKS))
}

fn books_schema_is_valid(ctx: &ServiceContext) -> BoxFuture<'_, Result<(), Error>> {
    Box::pin(list_matches_schema(ctx, &BOOKS, BOOKS_SCHEMA))
}

fn create_and_delete_book(ctx: &ServiceContext) -> BoxFuture<'_, Result<(), Error>> {
    Box::pin(create_then_delete(ctx, &BOOKS))
}

fn delete_non_existing_book(ctx: &ServiceContext) -> BoxFuture<'_, Result<(), Error>> {
    Box::pin(delete_unknown(ctx, &BOOKS))
}
